//! Literal values, wire encoding, and the per-column decode contract

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A SQL literal that can be bound as a query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit float
    Double(f64),
    /// String value
    Text(String),
    /// Timestamp with time zone
    Timestamp(DateTime<Utc>),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// UUID value
    #[cfg(feature = "uuid-support")]
    Uuid(uuid::Uuid),
    /// Arbitrary-precision decimal
    #[cfg(feature = "decimal-support")]
    Decimal(rust_decimal::Decimal),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the SQL type name for this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "BIGINT",
            Value::Double(_) => "DOUBLE PRECISION",
            Value::Text(_) => "TEXT",
            Value::Timestamp(_) => "TIMESTAMPTZ",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            #[cfg(feature = "uuid-support")]
            Value::Uuid(_) => "UUID",
            #[cfg(feature = "decimal-support")]
            Value::Decimal(_) => "NUMERIC",
        }
    }

    /// Render this value as the text-protocol parameter a transport sends.
    ///
    /// `None` stands for the SQL null. Timestamps use RFC 3339, dates
    /// `%Y-%m-%d`, times `%H:%M:%S%.f`.
    pub fn to_wire_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { "t".to_string() } else { "f".to_string() }),
            Value::Int(n) => Some(n.to_string()),
            Value::Double(x) => Some(x.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Timestamp(ts) => Some(ts.to_rfc3339()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => Some(t.format("%H:%M:%S%.f").to_string()),
            #[cfg(feature = "uuid-support")]
            Value::Uuid(u) => Some(u.to_string()),
            #[cfg(feature = "decimal-support")]
            Value::Decimal(d) => Some(d.to_string()),
        }
    }
}

/// Decode function attached to every expression node: turns one raw result
/// cell into a typed [`Value`]. The row-decoding collaborator never calls it
/// for null cells.
pub type DecodeFn = fn(&str) -> Result<Value>;

/// A Rust scalar type that maps onto one SQL literal kind
pub trait SqlType: Sized + Send + Sync + 'static {
    /// Decode one raw text cell into this kind's [`Value`]
    fn decode(raw: &str) -> Result<Value>;

    /// The decode function handed to the row-decoding collaborator
    fn decoder() -> DecodeFn {
        Self::decode
    }
}

impl SqlType for bool {
    fn decode(raw: &str) -> Result<Value> {
        match raw {
            "t" | "true" | "TRUE" | "1" => Ok(Value::Bool(true)),
            "f" | "false" | "FALSE" | "0" => Ok(Value::Bool(false)),
            other => Err(Error::decode(format!("invalid boolean: '{other}'"))),
        }
    }
}

impl SqlType for i64 {
    fn decode(raw: &str) -> Result<Value> {
        raw.parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Error::decode(format!("invalid integer: '{raw}'")))
    }
}

impl SqlType for i32 {
    fn decode(raw: &str) -> Result<Value> {
        <i64 as SqlType>::decode(raw)
    }
}

impl SqlType for f64 {
    fn decode(raw: &str) -> Result<Value> {
        raw.parse::<f64>()
            .map(Value::Double)
            .map_err(|_| Error::decode(format!("invalid double: '{raw}'")))
    }
}

impl SqlType for String {
    fn decode(raw: &str) -> Result<Value> {
        Ok(Value::Text(raw.to_string()))
    }
}

impl SqlType for DateTime<Utc> {
    fn decode(raw: &str) -> Result<Value> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Value::Timestamp(ts.with_timezone(&Utc)));
        }
        if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
            return Ok(Value::Timestamp(ts.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
            .map(|naive| Value::Timestamp(naive.and_utc()))
            .map_err(|_| Error::decode(format!("invalid timestamp: '{raw}'")))
    }
}

impl SqlType for NaiveDate {
    fn decode(raw: &str) -> Result<Value> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| Error::decode(format!("invalid date: '{raw}'")))
    }
}

impl SqlType for NaiveTime {
    fn decode(raw: &str) -> Result<Value> {
        NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
            .map(Value::Time)
            .map_err(|_| Error::decode(format!("invalid time: '{raw}'")))
    }
}

#[cfg(feature = "uuid-support")]
impl SqlType for uuid::Uuid {
    fn decode(raw: &str) -> Result<Value> {
        raw.parse::<uuid::Uuid>()
            .map(Value::Uuid)
            .map_err(|_| Error::decode(format!("invalid uuid: '{raw}'")))
    }
}

#[cfg(feature = "decimal-support")]
impl SqlType for rust_decimal::Decimal {
    fn decode(raw: &str) -> Result<Value> {
        raw.parse::<rust_decimal::Decimal>()
            .map(Value::Decimal)
            .map_err(|_| Error::decode(format!("invalid decimal: '{raw}'")))
    }
}

// A nullable column decodes like its inner kind; the null short-circuit
// happens before the decode function is invoked.
impl<T: SqlType> SqlType for Option<T> {
    fn decode(raw: &str) -> Result<Value> {
        T::decode(raw)
    }
}

/// Conversion from Rust values into SQL literals, tracking the SQL kind
pub trait IntoValue {
    /// The [`SqlType`] the resulting literal decodes back into
    type Sql: SqlType;

    fn into_value(self) -> Value;
}

impl IntoValue for bool {
    type Sql = bool;
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for i32 {
    type Sql = i64;
    fn into_value(self) -> Value {
        Value::Int(self as i64)
    }
}

impl IntoValue for i64 {
    type Sql = i64;
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl IntoValue for f64 {
    type Sql = f64;
    fn into_value(self) -> Value {
        Value::Double(self)
    }
}

impl IntoValue for &str {
    type Sql = String;
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for String {
    type Sql = String;
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for DateTime<Utc> {
    type Sql = DateTime<Utc>;
    fn into_value(self) -> Value {
        Value::Timestamp(self)
    }
}

impl IntoValue for NaiveDate {
    type Sql = NaiveDate;
    fn into_value(self) -> Value {
        Value::Date(self)
    }
}

impl IntoValue for NaiveTime {
    type Sql = NaiveTime;
    fn into_value(self) -> Value {
        Value::Time(self)
    }
}

#[cfg(feature = "uuid-support")]
impl IntoValue for uuid::Uuid {
    type Sql = uuid::Uuid;
    fn into_value(self) -> Value {
        Value::Uuid(self)
    }
}

#[cfg(feature = "decimal-support")]
impl IntoValue for rust_decimal::Decimal {
    type Sql = rust_decimal::Decimal;
    fn into_value(self) -> Value {
        Value::Decimal(self)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    type Sql = Option<T::Sql>;
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}
