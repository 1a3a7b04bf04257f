//! Scalar expression IR and the typed column handles built over it

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

use crate::scope::Name;
use crate::statement::Statement;
use crate::value::{DecodeFn, IntoValue, SqlType, Value};

/// How a column reference resolves
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRef {
    /// A table's own column, by its SQL name
    Base(String),
    /// A generated alias introduced by an enclosing statement
    Alias(Name),
    /// The `EXCLUDED` pseudo-row inside `ON CONFLICT DO UPDATE`
    Excluded(String),
}

impl ColumnRef {
    /// The identifier text this reference renders as
    pub fn render(&self) -> String {
        match self {
            ColumnRef::Base(name) => name.clone(),
            ColumnRef::Alias(name) => name.render(),
            ColumnRef::Excluded(name) => name.clone(),
        }
    }
}

/// Binary operators drawn from the fixed operator set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
    Like,
    ILike,
}

impl BinaryOp {
    /// Get the SQL representation of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Concat => "||",
            BinaryOp::Like => "LIKE",
            BinaryOp::ILike => "ILIKE",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
    Abs,
    Sign,
}

/// Aggregation function types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count | AggregateFunction::CountDistinct => write!(f, "COUNT"),
            AggregateFunction::Sum => write!(f, "SUM"),
            AggregateFunction::Avg => write!(f, "AVG"),
            AggregateFunction::Min => write!(f, "MIN"),
            AggregateFunction::Max => write!(f, "MAX"),
        }
    }
}

/// One part of a raw interpolated fragment
#[derive(Debug, Clone)]
pub enum RawPart {
    /// Verbatim SQL text, spliced without quoting or validation
    Text(String),
    /// An expression rendered in place
    Input(Expr),
}

/// The closed scalar expression variant set
#[derive(Debug, Clone)]
pub enum ExprKind {
    Column(ColumnRef),
    Literal(Value),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// String-named binary operator, the dialect escape hatch
    CustomBinary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// N-ary named function application
    Func {
        name: String,
        args: Vec<Expr>,
    },
    Cast {
        operand: Box<Expr>,
        sql_type: String,
    },
    /// Raw string/expression splice, explicitly unsafe
    Raw(Vec<RawPart>),
    Case {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Aggregate {
        func: AggregateFunction,
        arg: Option<Box<Expr>>,
    },
    InList {
        needle: Box<Expr>,
        list: Vec<Expr>,
    },
    InQuery {
        needle: Box<Expr>,
        query: Box<Statement>,
    },
    Exists(Box<Statement>),
}

/// A scalar expression node plus the decode function for its result cell
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub decode: DecodeFn,
}

impl Expr {
    pub fn new(kind: ExprKind, decode: DecodeFn) -> Self {
        Self { kind, decode }
    }

    pub fn base_column(name: impl Into<String>, decode: DecodeFn) -> Self {
        Self::new(ExprKind::Column(ColumnRef::Base(name.into())), decode)
    }

    pub fn alias_column(name: Name, decode: DecodeFn) -> Self {
        Self::new(ExprKind::Column(ColumnRef::Alias(name)), decode)
    }

    pub fn literal(value: Value, decode: DecodeFn) -> Self {
        Self::new(ExprKind::Literal(value), decode)
    }

    /// The rendered name, when this is a bare column reference
    pub fn column_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Column(r) => Some(r.render()),
            _ => None,
        }
    }

    /// Alias hint for a rename of this expression
    pub fn hint(&self) -> Cow<'static, str> {
        match &self.kind {
            ExprKind::Column(ColumnRef::Base(name)) => Cow::Owned(name.clone()),
            ExprKind::Column(ColumnRef::Alias(name)) => name.hint.clone(),
            _ => Cow::Borrowed("tmp"),
        }
    }

    /// Whether an aggregate application occurs anywhere in this tree.
    /// Embedded subqueries aggregate within their own statement and do not
    /// count.
    pub fn contains_aggregate(&self) -> bool {
        match &self.kind {
            ExprKind::Aggregate { .. } => true,
            ExprKind::Column(_) | ExprKind::Literal(_) => false,
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::CustomBinary { lhs, rhs, .. } => {
                lhs.contains_aggregate() || rhs.contains_aggregate()
            }
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
                operand.contains_aggregate()
            }
            ExprKind::Func { args, .. } => args.iter().any(Expr::contains_aggregate),
            ExprKind::Raw(parts) => parts.iter().any(|p| match p {
                RawPart::Text(_) => false,
                RawPart::Input(e) => e.contains_aggregate(),
            }),
            ExprKind::Case {
                cond,
                then,
                otherwise,
            } => {
                cond.contains_aggregate()
                    || then.contains_aggregate()
                    || otherwise.contains_aggregate()
            }
            ExprKind::InList { needle, list } => {
                needle.contains_aggregate() || list.iter().any(Expr::contains_aggregate)
            }
            ExprKind::InQuery { needle, .. } => needle.contains_aggregate(),
            ExprKind::Exists(_) => false,
        }
    }

    /// Collect every column name this tree references, including references
    /// made by embedded subquery statements (which may be correlated with
    /// enclosing statements).
    pub fn collect_refs(&self, out: &mut HashSet<String>) {
        match &self.kind {
            ExprKind::Column(r) => {
                out.insert(r.render());
            }
            ExprKind::Literal(_) => {}
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::CustomBinary { lhs, rhs, .. } => {
                lhs.collect_refs(out);
                rhs.collect_refs(out);
            }
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
                operand.collect_refs(out);
            }
            ExprKind::Func { args, .. } => {
                for arg in args {
                    arg.collect_refs(out);
                }
            }
            ExprKind::Raw(parts) => {
                for part in parts {
                    if let RawPart::Input(e) = part {
                        e.collect_refs(out);
                    }
                }
            }
            ExprKind::Case {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_refs(out);
                then.collect_refs(out);
                otherwise.collect_refs(out);
            }
            ExprKind::InList { needle, list } => {
                needle.collect_refs(out);
                for item in list {
                    item.collect_refs(out);
                }
            }
            ExprKind::InQuery { needle, query } => {
                needle.collect_refs(out);
                query.collect_refs(out);
            }
            ExprKind::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.collect_refs(out);
                }
            }
            ExprKind::Exists(query) => query.collect_refs(out),
        }
    }

    /// Collect the column names referenced from inside embedded subquery
    /// statements only. These references are never rewritten by
    /// [`substitute`](Expr::substitute), so a clause can only be merged into
    /// a statement when none of them name an alias that statement defines.
    pub fn collect_embedded_refs(&self, out: &mut HashSet<String>) {
        match &self.kind {
            ExprKind::Column(_) | ExprKind::Literal(_) => {}
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::CustomBinary { lhs, rhs, .. } => {
                lhs.collect_embedded_refs(out);
                rhs.collect_embedded_refs(out);
            }
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
                operand.collect_embedded_refs(out);
            }
            ExprKind::Func { args, .. } => {
                for arg in args {
                    arg.collect_embedded_refs(out);
                }
            }
            ExprKind::Raw(parts) => {
                for part in parts {
                    if let RawPart::Input(e) = part {
                        e.collect_embedded_refs(out);
                    }
                }
            }
            ExprKind::Case {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_embedded_refs(out);
                then.collect_embedded_refs(out);
                otherwise.collect_embedded_refs(out);
            }
            ExprKind::InList { needle, list } => {
                needle.collect_embedded_refs(out);
                for item in list {
                    item.collect_embedded_refs(out);
                }
            }
            ExprKind::InQuery { needle, query } => {
                needle.collect_embedded_refs(out);
                query.collect_refs(out);
            }
            ExprKind::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.collect_embedded_refs(out);
                }
            }
            ExprKind::Exists(query) => query.collect_refs(out),
        }
    }

    /// Replace alias references with their defining expressions. Embedded
    /// subquery statements are left untouched: their references must keep
    /// resolving against the enclosing FROM scope, so callers refuse the
    /// merge instead when an embedded reference names a rewritten alias.
    pub fn substitute(&mut self, map: &HashMap<String, Expr>) {
        if let ExprKind::Column(ColumnRef::Alias(name)) = &self.kind {
            if let Some(replacement) = map.get(&name.render()) {
                *self = replacement.clone();
                return;
            }
        }
        match &mut self.kind {
            ExprKind::Column(_) | ExprKind::Literal(_) => {}
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::CustomBinary { lhs, rhs, .. } => {
                lhs.substitute(map);
                rhs.substitute(map);
            }
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => {
                operand.substitute(map);
            }
            ExprKind::Func { args, .. } => {
                for arg in args {
                    arg.substitute(map);
                }
            }
            ExprKind::Raw(parts) => {
                for part in parts {
                    if let RawPart::Input(e) = part {
                        e.substitute(map);
                    }
                }
            }
            ExprKind::Case {
                cond,
                then,
                otherwise,
            } => {
                cond.substitute(map);
                then.substitute(map);
                otherwise.substitute(map);
            }
            ExprKind::InList { needle, list } => {
                needle.substitute(map);
                for item in list {
                    item.substitute(map);
                }
            }
            ExprKind::InQuery { needle, .. } => {
                needle.substitute(map);
            }
            ExprKind::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.substitute(map);
                }
            }
            ExprKind::Exists(_) => {}
        }
    }
}

/// A compile-time-typed handle over a scalar expression.
///
/// Handles are persistent: every combinator builds a new expression tree and
/// leaves its operands untouched, so cloning and reusing handles is cheap
/// and safe.
pub struct Col<T> {
    pub(crate) expr: Expr,
    pub(crate) property: Cow<'static, str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Col<T> {
    fn clone(&self) -> Self {
        Self {
            expr: self.expr.clone(),
            property: self.property.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Col<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Col")
            .field("expr", &self.expr)
            .field("property", &self.property)
            .finish()
    }
}

impl<T> Col<T> {
    pub(crate) fn from_parts(expr: Expr, property: impl Into<Cow<'static, str>>) -> Self {
        Self {
            expr,
            property: property.into(),
            _marker: PhantomData,
        }
    }

    /// Construct a handle from a raw expression. The caller is responsible
    /// for the static type agreeing with the expression's decode function.
    pub fn from_expr(expr: Expr, property: impl Into<Cow<'static, str>>) -> Self {
        Self::from_parts(expr, property)
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn into_expr(self) -> Expr {
        self.expr
    }

    /// The property name this column decodes under
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Rename the property this column decodes under
    pub fn named(mut self, property: &'static str) -> Self {
        self.property = Cow::Borrowed(property);
        self
    }
}

impl<T: SqlType> Col<T> {
    fn binary<U: SqlType, R>(self, op: BinaryOp, rhs: Col<R>) -> Col<U> {
        Col::from_parts(
            Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(self.expr),
                    rhs: Box::new(rhs.expr),
                },
                U::decoder(),
            ),
            self.property,
        )
    }

    fn unary<U: SqlType>(self, op: UnaryOp) -> Col<U> {
        Col::from_parts(
            Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(self.expr),
                },
                U::decoder(),
            ),
            self.property,
        )
    }

    pub fn eq(self, other: Col<T>) -> Col<bool> {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn ne(self, other: Col<T>) -> Col<bool> {
        self.binary(BinaryOp::Ne, other)
    }

    pub fn lt(self, other: Col<T>) -> Col<bool> {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn le(self, other: Col<T>) -> Col<bool> {
        self.binary(BinaryOp::Le, other)
    }

    pub fn gt(self, other: Col<T>) -> Col<bool> {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn ge(self, other: Col<T>) -> Col<bool> {
        self.binary(BinaryOp::Ge, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: Col<T>) -> Col<T> {
        self.binary(BinaryOp::Add, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, other: Col<T>) -> Col<T> {
        self.binary(BinaryOp::Sub, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, other: Col<T>) -> Col<T> {
        self.binary(BinaryOp::Mul, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(self, other: Col<T>) -> Col<T> {
        self.binary(BinaryOp::Div, other)
    }

    pub fn rem(self, other: Col<T>) -> Col<T> {
        self.binary(BinaryOp::Rem, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn neg(self) -> Col<T> {
        self.unary(UnaryOp::Neg)
    }

    pub fn abs(self) -> Col<T> {
        self.unary(UnaryOp::Abs)
    }

    pub fn sign(self) -> Col<i64> {
        self.unary(UnaryOp::Sign)
    }

    pub fn like(self, pattern: Col<String>) -> Col<bool> {
        self.binary(BinaryOp::Like, pattern)
    }

    pub fn ilike(self, pattern: Col<String>) -> Col<bool> {
        self.binary(BinaryOp::ILike, pattern)
    }

    pub fn concat(self, other: Col<String>) -> Col<String> {
        self.binary(BinaryOp::Concat, other)
    }

    pub fn is_null(self) -> Col<bool> {
        self.unary(UnaryOp::IsNull)
    }

    pub fn is_not_null(self) -> Col<bool> {
        self.unary(UnaryOp::IsNotNull)
    }

    /// `CAST(self AS sql_type)`
    pub fn cast<U: SqlType>(self, sql_type: impl Into<String>) -> Col<U> {
        Col::from_parts(
            Expr::new(
                ExprKind::Cast {
                    operand: Box::new(self.expr),
                    sql_type: sql_type.into(),
                },
                U::decoder(),
            ),
            self.property,
        )
    }

    /// Membership in an explicit alternative list. An empty list lowers to
    /// the `false` literal so the printer never emits `IN ()`.
    pub fn in_list(self, items: Vec<Col<T>>) -> Col<bool> {
        if items.is_empty() {
            return Col::from_parts(
                Expr::literal(Value::Bool(false), bool::decoder()),
                self.property,
            );
        }
        Col::from_parts(
            Expr::new(
                ExprKind::InList {
                    needle: Box::new(self.expr),
                    list: items.into_iter().map(Col::into_expr).collect(),
                },
                bool::decoder(),
            ),
            self.property,
        )
    }
}

impl Col<bool> {
    pub fn and(self, other: Col<bool>) -> Col<bool> {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: Col<bool>) -> Col<bool> {
        self.binary(BinaryOp::Or, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Col<bool> {
        self.unary(UnaryOp::Not)
    }
}

/// A literal column
pub fn lit<V: IntoValue>(value: V) -> Col<V::Sql> {
    Col::from_parts(
        Expr::literal(value.into_value(), <V::Sql as SqlType>::decoder()),
        "value",
    )
}

/// `CASE WHEN cond THEN a ELSE b END`
pub fn if_else<T: SqlType>(cond: Col<bool>, then: Col<T>, otherwise: Col<T>) -> Col<T> {
    Col::from_parts(
        Expr::new(
            ExprKind::Case {
                cond: Box::new(cond.expr),
                then: Box::new(then.expr),
                otherwise: Box::new(otherwise.expr),
            },
            T::decoder(),
        ),
        "value",
    )
}

/// Apply a named SQL function to the given arguments.
///
/// This is the generic primitive the domain-specific helper bindings
/// (date/time, string, math) call into.
pub fn call<U: SqlType>(name: impl Into<String>, args: Vec<Expr>) -> Col<U> {
    Col::from_parts(
        Expr::new(
            ExprKind::Func {
                name: name.into(),
                args,
            },
            U::decoder(),
        ),
        "value",
    )
}

/// Apply a string-named binary operator, the dialect escape hatch
pub fn custom_op<L: SqlType, R: SqlType, U: SqlType>(
    op: impl Into<String>,
    lhs: Col<L>,
    rhs: Col<R>,
) -> Col<U> {
    Col::from_parts(
        Expr::new(
            ExprKind::CustomBinary {
                op: op.into(),
                lhs: Box::new(lhs.expr),
                rhs: Box::new(rhs.expr),
            },
            U::decoder(),
        ),
        "value",
    )
}

/// Splice raw SQL text and expressions. Unsafe by design: the text parts are
/// rendered verbatim with no quoting or validation.
pub fn raw<U: SqlType>(parts: Vec<RawPart>) -> Col<U> {
    Col::from_parts(Expr::new(ExprKind::Raw(parts), U::decoder()), "value")
}

/// An aggregate-typed handle, produced inside an `aggregate` block. It can
/// be selected out of the block but is not an ordinary scalar.
pub struct Aggregated<T> {
    pub(crate) expr: Expr,
    pub(crate) property: Cow<'static, str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Aggregated<T> {
    fn clone(&self) -> Self {
        Self {
            expr: self.expr.clone(),
            property: self.property.clone(),
            _marker: PhantomData,
        }
    }
}

/// A grouping-column handle, produced by `group_by` inside an `aggregate`
/// block. It can be selected out of the block but is not reusable as an
/// ordinary scalar in the block's own context.
pub struct Grouped<T> {
    pub(crate) expr: Expr,
    pub(crate) property: Cow<'static, str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Grouped<T> {
    fn clone(&self) -> Self {
        Self {
            expr: self.expr.clone(),
            property: self.property.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Grouped<T> {
    pub(crate) fn from_parts(expr: Expr, property: Cow<'static, str>) -> Self {
        Self {
            expr,
            property,
            _marker: PhantomData,
        }
    }
}

fn aggregate_expr<U: SqlType>(
    func: AggregateFunction,
    arg: Option<Expr>,
    property: Cow<'static, str>,
) -> Aggregated<U> {
    Aggregated {
        expr: Expr::new(
            ExprKind::Aggregate {
                func,
                arg: arg.map(Box::new),
            },
            U::decoder(),
        ),
        property,
        _marker: PhantomData,
    }
}

/// `COUNT(col)`
pub fn count<T: SqlType>(col: Col<T>) -> Aggregated<i64> {
    aggregate_expr(AggregateFunction::Count, Some(col.expr), "count".into())
}

/// `COUNT(*)`
pub fn count_all() -> Aggregated<i64> {
    aggregate_expr(AggregateFunction::Count, None, "count".into())
}

/// `COUNT(DISTINCT col)`
pub fn count_distinct<T: SqlType>(col: Col<T>) -> Aggregated<i64> {
    aggregate_expr(
        AggregateFunction::CountDistinct,
        Some(col.expr),
        "count".into(),
    )
}

/// `SUM(col)`
pub fn sum<T: SqlType>(col: Col<T>) -> Aggregated<T> {
    aggregate_expr(AggregateFunction::Sum, Some(col.expr), "sum".into())
}

/// `AVG(col)`
pub fn avg<T: SqlType>(col: Col<T>) -> Aggregated<f64> {
    aggregate_expr(AggregateFunction::Avg, Some(col.expr), "avg".into())
}

/// `MIN(col)`
pub fn min<T: SqlType>(col: Col<T>) -> Aggregated<T> {
    aggregate_expr(AggregateFunction::Min, Some(col.expr), "min".into())
}

/// `MAX(col)`
pub fn max<T: SqlType>(col: Col<T>) -> Aggregated<T> {
    aggregate_expr(AggregateFunction::Max, Some(col.expr), "max".into())
}

/// Present columns as nullable, as a left join's right side requires
pub trait IntoNullable {
    type Nullable;

    fn into_nullable(self) -> Self::Nullable;
}

impl<T: SqlType> IntoNullable for Col<T> {
    type Nullable = Col<Option<T>>;

    fn into_nullable(self) -> Col<Option<T>> {
        Col::from_parts(self.expr, self.property)
    }
}

macro_rules! nullable_tuple {
    ($($name:ident),+) => {
        impl<$($name: IntoNullable),+> IntoNullable for ($($name,)+) {
            type Nullable = ($($name::Nullable,)+);

            #[allow(non_snake_case)]
            fn into_nullable(self) -> Self::Nullable {
                let ($($name,)+) = self;
                ($($name.into_nullable(),)+)
            }
        }
    };
}

nullable_tuple!(A);
nullable_tuple!(A, B);
nullable_tuple!(A, B, C);
nullable_tuple!(A, B, C, D);
nullable_tuple!(A, B, C, D, E);
nullable_tuple!(A, B, C, D, E, F);
nullable_tuple!(A, B, C, D, E, F, G);
nullable_tuple!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_strings() {
        assert_eq!(BinaryOp::Gt.as_str(), ">");
        assert_eq!(BinaryOp::Le.as_str(), "<=");
        assert_eq!(BinaryOp::Like.as_str(), "LIKE");
        assert_eq!(BinaryOp::Concat.as_str(), "||");
        assert_eq!(AggregateFunction::Sum.to_string(), "SUM");
    }

    #[test]
    fn test_handles_are_persistent() {
        let age: Col<i64> = Col::from_expr(Expr::base_column("age", i64::decoder()), "age");
        let adult = age.clone().ge(lit(18));
        let senior = age.clone().ge(lit(65));
        // Combining did not disturb the shared operand.
        assert_eq!(age.expr().column_name().unwrap(), "age");
        assert!(matches!(adult.expr().kind, ExprKind::Binary { .. }));
        assert!(matches!(senior.expr().kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn test_empty_in_list_is_false_literal() {
        let age: Col<i64> = Col::from_expr(Expr::base_column("age", i64::decoder()), "age");
        let never = age.in_list(vec![]);
        assert!(matches!(
            never.expr().kind,
            ExprKind::Literal(Value::Bool(false))
        ));
    }

    #[test]
    fn test_contains_aggregate() {
        let city: Col<String> = Col::from_expr(Expr::base_column("city", String::decoder()), "city");
        let n = count(city);
        assert!(n.expr.contains_aggregate());

        let age: Col<i64> = Col::from_expr(Expr::base_column("age", i64::decoder()), "age");
        assert!(!age.clone().gt(lit(20)).expr.contains_aggregate());
    }

    #[test]
    fn test_collect_refs() {
        let age: Col<i64> = Col::from_expr(Expr::base_column("age", i64::decoder()), "age");
        let name: Col<String> = Col::from_expr(Expr::base_column("name", String::decoder()), "name");
        let pred = age.gt(lit(20)).and(name.eq(lit("A")));
        let mut refs = HashSet::new();
        pred.expr.collect_refs(&mut refs);
        assert!(refs.contains("age"));
        assert!(refs.contains("name"));
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_substitute_alias() {
        let alias = Name::new("age", 0, 1);
        let handle: Col<i64> =
            Col::from_expr(Expr::alias_column(alias.clone(), i64::decoder()), "age");
        let mut pred = handle.gt(lit(20)).into_expr();
        let mut map = HashMap::new();
        map.insert(alias.render(), Expr::base_column("age", i64::decoder()));
        pred.substitute(&map);
        let mut refs = HashSet::new();
        pred.collect_refs(&mut refs);
        assert!(refs.contains("age"));
        assert!(!refs.contains("age_1"));
    }
}
