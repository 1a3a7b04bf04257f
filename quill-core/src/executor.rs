//! Query execution and connection pool interface.
//!
//! The compiler never performs I/O itself: it emits `(sql, params)` plus a
//! per-column decode contract. These traits are the seam a concrete driver
//! implements; row transport is raw text cells, with `None` for SQL null.

use std::future::Future;

use crate::builder::{CompiledSelect, CompiledWrite, RowColumn};
use crate::error::{Error, Result};
use crate::value::Value;

/// Trait for database connection pools
pub trait ConnectionPool: Send + Sync + Clone {
    /// Execute a statement that returns no rows, yielding the affected count
    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = Result<u64>> + Send;

    /// Execute a statement and return its raw text rows
    fn fetch_raw(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Result<Vec<Vec<Option<String>>>>> + Send;
}

/// One decoded result row, in output-column order
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub values: Vec<(String, Value)>,
}

impl DecodedRow {
    /// Look up a decoded value by property name
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }
}

/// Apply the per-column decode contract to one raw row. A null cell
/// short-circuits to a typed null without invoking the decode function.
fn decode_row(columns: &[RowColumn], raw: &[Option<String>]) -> Result<DecodedRow> {
    if columns.len() != raw.len() {
        return Err(Error::decode(format!(
            "expected {} columns, row has {}",
            columns.len(),
            raw.len()
        )));
    }
    let values = columns
        .iter()
        .zip(raw)
        .map(|(column, cell)| {
            let value = match cell {
                None => Value::Null,
                Some(text) => (column.decode)(text.as_str())?,
            };
            Ok((column.property.clone(), value))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DecodedRow { values })
}

impl CompiledSelect {
    /// Decode one raw text row against this query's output shape
    pub fn decode_row(&self, raw: &[Option<String>]) -> Result<DecodedRow> {
        decode_row(&self.columns, raw)
    }
}

impl CompiledWrite {
    /// Decode one raw text row against this statement's RETURNING shape
    pub fn decode_row(&self, raw: &[Option<String>]) -> Result<DecodedRow> {
        decode_row(&self.columns, raw)
    }
}

/// Extension trait adding execution methods to compiled queries
pub trait ExecutableQuery {
    /// Execute the query and return all decoded rows
    fn fetch_all<P: ConnectionPool>(
        &self,
        pool: &P,
    ) -> impl Future<Output = Result<Vec<DecodedRow>>> + Send;

    /// Execute the query and return the first decoded row
    fn fetch_one<P: ConnectionPool>(
        &self,
        pool: &P,
    ) -> impl Future<Output = Result<DecodedRow>> + Send;

    /// Execute the query and return an optional decoded row
    fn fetch_optional<P: ConnectionPool>(
        &self,
        pool: &P,
    ) -> impl Future<Output = Result<Option<DecodedRow>>> + Send;
}

impl ExecutableQuery for CompiledSelect {
    fn fetch_all<P: ConnectionPool>(
        &self,
        pool: &P,
    ) -> impl Future<Output = Result<Vec<DecodedRow>>> + Send {
        async move {
            let rows = pool.fetch_raw(&self.sql, &self.params).await?;
            rows.iter().map(|row| self.decode_row(row)).collect()
        }
    }

    fn fetch_one<P: ConnectionPool>(
        &self,
        pool: &P,
    ) -> impl Future<Output = Result<DecodedRow>> + Send {
        async move {
            self.fetch_optional(pool)
                .await?
                .ok_or(Error::Database(sqlx::Error::RowNotFound))
        }
    }

    fn fetch_optional<P: ConnectionPool>(
        &self,
        pool: &P,
    ) -> impl Future<Output = Result<Option<DecodedRow>>> + Send {
        async move {
            let rows = pool.fetch_raw(&self.sql, &self.params).await?;
            rows.first().map(|row| self.decode_row(row)).transpose()
        }
    }
}

/// Extension trait adding execution methods to compiled write statements
pub trait ExecutableModification {
    /// Execute the statement, returning the affected row count
    fn execute<P: ConnectionPool>(&self, pool: &P) -> impl Future<Output = Result<u64>> + Send;

    /// Execute the statement and decode its RETURNING rows
    fn fetch_returning<P: ConnectionPool>(
        &self,
        pool: &P,
    ) -> impl Future<Output = Result<Vec<DecodedRow>>> + Send;
}

impl ExecutableModification for CompiledWrite {
    fn execute<P: ConnectionPool>(&self, pool: &P) -> impl Future<Output = Result<u64>> + Send {
        async move { pool.execute(&self.sql, &self.params).await }
    }

    fn fetch_returning<P: ConnectionPool>(
        &self,
        pool: &P,
    ) -> impl Future<Output = Result<Vec<DecodedRow>>> + Send {
        async move {
            let rows = pool.fetch_raw(&self.sql, &self.params).await?;
            rows.iter().map(|row| self.decode_row(row)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::query;
    use crate::expr::lit;

    crate::table! {
        mod person => "person" {
            name: String => "name",
            age: i64 => "age",
        }
    }

    #[derive(Clone)]
    struct FakePool {
        rows: Vec<Vec<Option<String>>>,
    }

    impl ConnectionPool for FakePool {
        fn execute(
            &self,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Result<u64>> + Send {
            async move { Ok(self.rows.len() as u64) }
        }

        fn fetch_raw(
            &self,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Result<Vec<Vec<Option<String>>>>> + Send {
            async move { Ok(self.rows.clone()) }
        }
    }

    fn people_query() -> CompiledSelect {
        query(|q| {
            let p = q.select(&person::table());
            q.restrict(p.age.clone().gt(lit(20i64)));
            (p.name, p.age)
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_all_decodes_rows_in_order() {
        let pool = FakePool {
            rows: vec![vec![Some("A".to_string()), Some("30".to_string())]],
        };
        let rows = people_query().fetch_all(&pool).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::Text("A".to_string())));
        assert_eq!(rows[0].get("age"), Some(&Value::Int(30)));
    }

    #[tokio::test]
    async fn test_null_cells_short_circuit_without_decoding() {
        // A null in a BIGINT column must not reach the integer parser.
        let pool = FakePool {
            rows: vec![vec![Some("Velvet".to_string()), None]],
        };
        let rows = people_query().fetch_all(&pool).await.unwrap();
        assert_eq!(rows[0].get("age"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_decode_failure_surfaces_as_decode_error() {
        let pool = FakePool {
            rows: vec![vec![Some("A".to_string()), Some("thirty".to_string())]],
        };
        let result = people_query().fetch_all(&pool).await;
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn test_fetch_one_reports_missing_row() {
        let pool = FakePool { rows: vec![] };
        let result = tokio_test::block_on(people_query().fetch_one(&pool));
        assert!(matches!(
            result,
            Err(Error::Database(sqlx::Error::RowNotFound))
        ));
    }

    #[test]
    fn test_column_count_mismatch() {
        let compiled = people_query();
        let result = compiled.decode_row(&[Some("A".to_string())]);
        assert!(matches!(result, Err(Error::Decode { .. })));
    }
}
