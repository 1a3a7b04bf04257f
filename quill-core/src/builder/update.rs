//! UPDATE statement builder

use crate::builder::insert::{render_returning, ColumnAssignment, CompiledWrite};
use crate::builder::query::{Projection, ProjectedColumn};
use crate::error::{Error, Result};
use crate::expr::{Col, Expr};
use crate::printer::{ident, Printer};
use crate::table::{raw_columns, TableSchema};

/// UPDATE statement builder
pub struct UpdateBuilder<T: TableSchema> {
    table: T,
    sets: Vec<(&'static str, ColumnAssignment)>,
    filter: Option<Expr>,
    returning: Option<Vec<ProjectedColumn>>,
}

impl<T: TableSchema> UpdateBuilder<T> {
    pub fn new(table: T) -> Self {
        Self {
            table,
            sets: Vec::new(),
            filter: None,
            returning: None,
        }
    }

    /// Add SET assignments. A `Default` assignment keeps the column's
    /// current value.
    pub fn set(mut self, assignments: Vec<(&'static str, ColumnAssignment)>) -> Self {
        self.sets.extend(assignments);
        self
    }

    /// Restrict which rows are updated. Repeated calls conjoin.
    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&T::Columns) -> Col<bool>,
    {
        let cols = raw_columns(&self.table);
        let predicate = f(&cols);
        self.filter = Some(match self.filter.take() {
            None => predicate.into_expr(),
            Some(existing) => Col::<bool>::from_expr(existing, "filter")
                .and(predicate)
                .into_expr(),
        });
        self
    }

    /// Attach a RETURNING projection over the table's own columns
    pub fn returning<P, F>(mut self, f: F) -> Self
    where
        P: Projection,
        F: FnOnce(&T::Columns) -> P,
    {
        let cols = raw_columns(&self.table);
        self.returning = Some(f(&cols).into_columns());
        self
    }

    /// Render the statement
    pub fn compile(&self) -> Result<CompiledWrite> {
        let desc = self.table.desc();
        if self.sets.is_empty() {
            return Err(Error::invalid_query("UPDATE requires SET clauses"));
        }
        for (name, _) in &self.sets {
            if desc.column(name).is_none() {
                return Err(Error::column_not_found(desc.name, *name));
            }
        }

        let mut printer = Printer::new();
        printer.push("UPDATE ");
        printer.table_name(desc.name);
        printer.push(" SET ");

        // Keep-current assignments are dropped, unless that would leave the
        // SET list empty; one self-assignment keeps the statement valid.
        let real: Vec<&(&'static str, ColumnAssignment)> = self
            .sets
            .iter()
            .filter(|(_, value)| !matches!(value, ColumnAssignment::Default))
            .collect();
        if real.is_empty() {
            let (name, _) = self.sets[0];
            let quoted = ident(name);
            printer.push(&quoted);
            printer.push(" = ");
            printer.push(&quoted);
        } else {
            for (i, (name, value)) in real.iter().enumerate() {
                if i > 0 {
                    printer.push(", ");
                }
                let quoted = ident(name);
                printer.push(&quoted);
                printer.push(" = ");
                match value {
                    ColumnAssignment::Default => unreachable!("filtered above"),
                    ColumnAssignment::Value(value) => printer.param(value),
                    ColumnAssignment::Expr(expr) => printer.expr(expr),
                }
            }
        }

        if let Some(filter) = &self.filter {
            printer.push(" WHERE ");
            printer.expr(filter);
        }

        let columns = render_returning(&mut printer, self.returning.as_deref())?;
        let printed = printer.finish();
        tracing::debug!(sql = %printed.sql, params = printed.params.len(), "compiled update");
        Ok(CompiledWrite {
            sql: printed.sql,
            params: printed.params,
            columns,
            tables: printed.tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::insert::assign;
    use crate::expr::lit;
    use crate::value::Value;

    crate::table! {
        mod person => "person" {
            serial: i64 => "serial",
            name: String => "name",
            age: i64 => "age",
        }
    }

    #[test]
    fn test_update_basic() {
        let compiled = UpdateBuilder::new(person::table())
            .set(vec![("name", assign("B"))])
            .filter(|cols| cols.serial.clone().eq(lit(1i64)))
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "UPDATE \"person\" SET \"name\" = $1 WHERE \"serial\" = $2"
        );
        assert_eq!(
            compiled.params,
            vec![Value::Text("B".to_string()), Value::Int(1)]
        );
    }

    #[test]
    fn test_update_with_expression_assignment() {
        let cols = crate::table::raw_columns(&person::table());
        let compiled = UpdateBuilder::new(person::table())
            .set(vec![(
                "age",
                ColumnAssignment::Expr(cols.age.clone().add(lit(1i64)).into_expr()),
            )])
            .compile()
            .unwrap();

        assert_eq!(compiled.sql, "UPDATE \"person\" SET \"age\" = \"age\" + $1");
    }

    #[test]
    fn test_update_skips_keep_current_assignments() {
        let compiled = UpdateBuilder::new(person::table())
            .set(vec![
                ("serial", ColumnAssignment::Default),
                ("name", assign("B")),
            ])
            .compile()
            .unwrap();

        assert_eq!(compiled.sql, "UPDATE \"person\" SET \"name\" = $1");
    }

    #[test]
    fn test_wholly_noop_update_reassigns_one_column_to_itself() {
        let compiled = UpdateBuilder::new(person::table())
            .set(vec![
                ("serial", ColumnAssignment::Default),
                ("name", ColumnAssignment::Default),
            ])
            .compile()
            .unwrap();

        assert_eq!(compiled.sql, "UPDATE \"person\" SET \"serial\" = \"serial\"");
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_update_without_set_fails() {
        let result = UpdateBuilder::new(person::table())
            .filter(|cols| cols.serial.clone().eq(lit(1i64)))
            .compile();
        assert!(matches!(result, Err(Error::InvalidQuery { .. })));
    }

    #[test]
    fn test_update_with_returning() {
        let compiled = UpdateBuilder::new(person::table())
            .set(vec![("name", assign("B"))])
            .returning(|cols| (cols.serial.clone(), cols.name.clone()))
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "UPDATE \"person\" SET \"name\" = $1 RETURNING \"serial\", \"name\""
        );
        assert_eq!(compiled.columns.len(), 2);
    }

    #[test]
    fn test_update_empty_returning_fails() {
        let result = UpdateBuilder::new(person::table())
            .set(vec![("name", assign("B"))])
            .returning(|_| Vec::<ProjectedColumn>::new())
            .compile();
        assert!(matches!(result, Err(Error::InvalidQuery { .. })));
    }

    #[test]
    fn test_repeated_filters_conjoin() {
        let compiled = UpdateBuilder::new(person::table())
            .set(vec![("name", assign("B"))])
            .filter(|cols| cols.age.clone().gt(lit(20i64)))
            .filter(|cols| cols.age.clone().lt(lit(65i64)))
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "UPDATE \"person\" SET \"name\" = $1 WHERE (\"age\" > $2) AND (\"age\" < $3)"
        );
    }
}
