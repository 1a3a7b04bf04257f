//! DELETE statement builder

use crate::builder::insert::CompiledWrite;
use crate::error::Result;
use crate::expr::{Col, Expr};
use crate::printer::Printer;
use crate::table::{raw_columns, TableSchema};

/// DELETE builder in initial state. A predicate is required before the
/// statement can be rendered, so an unfiltered table wipe cannot be
/// expressed by accident.
pub struct DeleteBuilderInitial<T: TableSchema> {
    table: T,
}

/// DELETE builder with a predicate attached
pub struct DeleteBuilderComplete<T: TableSchema> {
    table: T,
    filter: Expr,
}

impl<T: TableSchema> DeleteBuilderInitial<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    /// Restrict which rows are deleted, transitioning to the renderable
    /// state
    pub fn filter<F>(self, f: F) -> DeleteBuilderComplete<T>
    where
        F: FnOnce(&T::Columns) -> Col<bool>,
    {
        let cols = raw_columns(&self.table);
        DeleteBuilderComplete {
            filter: f(&cols).into_expr(),
            table: self.table,
        }
    }
}

impl<T: TableSchema> DeleteBuilderComplete<T> {
    /// Conjoin another predicate
    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&T::Columns) -> Col<bool>,
    {
        let cols = raw_columns(&self.table);
        self.filter = Col::<bool>::from_expr(self.filter, "filter")
            .and(f(&cols))
            .into_expr();
        self
    }

    /// Render the statement
    pub fn compile(&self) -> Result<CompiledWrite> {
        let desc = self.table.desc();
        let mut printer = Printer::new();
        printer.push("DELETE FROM ");
        printer.table_name(desc.name);
        printer.push(" WHERE ");
        printer.expr(&self.filter);
        let printed = printer.finish();
        tracing::debug!(sql = %printed.sql, params = printed.params.len(), "compiled delete");
        Ok(CompiledWrite {
            sql: printed.sql,
            params: printed.params,
            columns: Vec::new(),
            tables: printed.tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lit;
    use crate::value::Value;

    crate::table! {
        mod person => "person" {
            serial: i64 => "serial",
            age: i64 => "age",
        }
    }

    #[test]
    fn test_delete_requires_filter_to_render() {
        let compiled = DeleteBuilderInitial::new(person::table())
            .filter(|cols| cols.age.clone().lt(lit(18i64)))
            .compile()
            .unwrap();

        assert_eq!(compiled.sql, "DELETE FROM \"person\" WHERE \"age\" < $1");
        assert_eq!(compiled.params, vec![Value::Int(18)]);
    }

    #[test]
    fn test_delete_conjoins_filters() {
        let compiled = DeleteBuilderInitial::new(person::table())
            .filter(|cols| cols.age.clone().lt(lit(18i64)))
            .filter(|cols| cols.serial.clone().ne(lit(1i64)))
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "DELETE FROM \"person\" WHERE (\"age\" < $1) AND (\"serial\" != $2)"
        );
    }
}
