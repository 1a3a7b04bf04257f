//! INSERT statement builder

use std::collections::{BTreeSet, HashMap};

use crate::builder::query::{Projection, ProjectedColumn, RowColumn};
use crate::error::{Error, Result};
use crate::expr::{Col, ColumnRef, Expr, ExprKind};
use crate::printer::{ident, Printer};
use crate::statement::SelectColumn;
use crate::table::{raw_columns, TableSchema};
use crate::value::{IntoValue, SqlType, Value};

/// What an inserted or updated column receives.
///
/// `Default` stands for the column's database-side default; it is a variant,
/// not a sentinel value, so detection never relies on reference identity.
#[derive(Debug, Clone)]
pub enum ColumnAssignment {
    /// Use the column's database-side default (a no-op in UPDATE)
    Default,
    /// Bind a literal value
    Value(Value),
    /// Compute from an expression
    Expr(Expr),
}

/// Assign a literal value to a column
pub fn assign<V: IntoValue>(value: V) -> ColumnAssignment {
    ColumnAssignment::Value(value.into_value())
}

/// Reference the `EXCLUDED` pseudo-row's copy of a column inside
/// `ON CONFLICT DO UPDATE`
pub fn excluded<T: SqlType>(col: &Col<T>) -> Col<T> {
    let name = col
        .expr()
        .column_name()
        .unwrap_or_else(|| col.property().to_string());
    Col::from_expr(
        Expr::new(ExprKind::Column(ColumnRef::Excluded(name)), col.expr().decode),
        col.property().to_string(),
    )
}

/// Conflict resolution for INSERT
#[derive(Debug, Clone)]
pub enum OnConflict {
    /// `ON CONFLICT (target) DO NOTHING`
    DoNothing { target: Vec<&'static str> },
    /// `ON CONFLICT (target) DO UPDATE SET … [WHERE …]`
    DoUpdate {
        target: Vec<&'static str>,
        set: Vec<(&'static str, ColumnAssignment)>,
        filter: Option<Expr>,
    },
}

/// A compiled write statement: SQL text, ordered bind parameters, and the
/// RETURNING row shape (empty when nothing is returned)
#[derive(Debug, Clone)]
pub struct CompiledWrite {
    pub sql: String,
    pub params: Vec<Value>,
    pub columns: Vec<RowColumn>,
    pub tables: BTreeSet<String>,
}

/// INSERT statement builder
pub struct InsertBuilder<T: TableSchema> {
    table: T,
    rows: Vec<Vec<(&'static str, ColumnAssignment)>>,
    conflict: Option<OnConflict>,
    returning: Option<Vec<ProjectedColumn>>,
}

impl<T: TableSchema> InsertBuilder<T> {
    pub fn new(table: T) -> Self {
        Self {
            table,
            rows: Vec::new(),
            conflict: None,
            returning: None,
        }
    }

    /// Insert a single record. Columns left unassigned receive their
    /// database-side default.
    pub fn values(mut self, row: Vec<(&'static str, ColumnAssignment)>) -> Self {
        self.rows.push(row);
        self
    }

    /// Insert multiple records
    pub fn values_many(mut self, rows: Vec<Vec<(&'static str, ColumnAssignment)>>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// `ON CONFLICT (target) DO NOTHING`
    pub fn on_conflict_do_nothing(mut self, target: &[&'static str]) -> Self {
        self.conflict = Some(OnConflict::DoNothing {
            target: target.to_vec(),
        });
        self
    }

    /// `ON CONFLICT (target) DO UPDATE SET … [WHERE …]`
    pub fn on_conflict_do_update(
        mut self,
        target: &[&'static str],
        set: Vec<(&'static str, ColumnAssignment)>,
        filter: Option<Col<bool>>,
    ) -> Self {
        self.conflict = Some(OnConflict::DoUpdate {
            target: target.to_vec(),
            set,
            filter: filter.map(Col::into_expr),
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
        if self.rows.is_empty() {
            return Err(Error::invalid_query("INSERT requires columns and values"));
        }

        let mut printer = Printer::new();
        printer.push("INSERT INTO ");
        printer.table_name(desc.name);
        printer.push(" (");
        for (i, def) in desc.columns.iter().enumerate() {
            if i > 0 {
                printer.push(", ");
            }
            let quoted = ident(def.sql);
            printer.push(&quoted);
        }
        printer.push(") VALUES ");

        for (row_index, row) in self.rows.iter().enumerate() {
            let mut by_name: HashMap<&str, &ColumnAssignment> = HashMap::new();
            for (name, value) in row {
                if desc.column(name).is_none() {
                    return Err(Error::column_not_found(desc.name, *name));
                }
                by_name.insert(*name, value);
            }
            if row_index > 0 {
                printer.push(", ");
            }
            printer.push("(");
            for (i, def) in desc.columns.iter().enumerate() {
                if i > 0 {
                    printer.push(", ");
                }
                match by_name.get(def.sql) {
                    None | Some(ColumnAssignment::Default) => printer.push("DEFAULT"),
                    Some(ColumnAssignment::Value(value)) => printer.param(value),
                    Some(ColumnAssignment::Expr(expr)) => printer.expr(expr),
                }
            }
            printer.push(")");
        }

        match &self.conflict {
            None => {}
            Some(OnConflict::DoNothing { target }) => {
                render_conflict_target(&mut printer, &desc, target)?;
                printer.push(" DO NOTHING");
            }
            Some(OnConflict::DoUpdate {
                target,
                set,
                filter,
            }) => {
                if set.is_empty() {
                    return Err(Error::invalid_query("DO UPDATE requires SET clauses"));
                }
                render_conflict_target(&mut printer, &desc, target)?;
                printer.push(" DO UPDATE SET ");
                for (i, (name, value)) in set.iter().enumerate() {
                    if desc.column(name).is_none() {
                        return Err(Error::column_not_found(desc.name, *name));
                    }
                    if i > 0 {
                        printer.push(", ");
                    }
                    let quoted = ident(name);
                    printer.push(&quoted);
                    printer.push(" = ");
                    match value {
                        ColumnAssignment::Default => printer.push("DEFAULT"),
                        ColumnAssignment::Value(value) => printer.param(value),
                        ColumnAssignment::Expr(expr) => printer.expr(expr),
                    }
                }
                if let Some(filter) = filter {
                    printer.push(" WHERE ");
                    printer.expr(filter);
                }
            }
        }

        let columns = render_returning(&mut printer, self.returning.as_deref())?;
        let printed = printer.finish();
        tracing::debug!(sql = %printed.sql, params = printed.params.len(), "compiled insert");
        Ok(CompiledWrite {
            sql: printed.sql,
            params: printed.params,
            columns,
            tables: printed.tables,
        })
    }
}

fn render_conflict_target(
    printer: &mut Printer,
    desc: &crate::table::TableDesc,
    target: &[&'static str],
) -> Result<()> {
    printer.push(" ON CONFLICT (");
    for (i, name) in target.iter().enumerate() {
        if desc.column(name).is_none() {
            return Err(Error::column_not_found(desc.name, *name));
        }
        if i > 0 {
            printer.push(", ");
        }
        let quoted = ident(name);
        printer.push(&quoted);
    }
    printer.push(")");
    Ok(())
}

/// Render a RETURNING clause and produce its row shape. Shared by the
/// INSERT and UPDATE builders.
pub(crate) fn render_returning(
    printer: &mut Printer,
    returning: Option<&[ProjectedColumn]>,
) -> Result<Vec<RowColumn>> {
    let Some(returning) = returning else {
        return Ok(Vec::new());
    };
    if returning.is_empty() {
        return Err(Error::invalid_query(
            "RETURNING requires at least one column",
        ));
    }
    printer.push(" RETURNING ");
    let rendered: Vec<SelectColumn> = returning
        .iter()
        .map(|column| SelectColumn::Output {
            property: column.property.clone(),
            expr: column.expr.clone(),
        })
        .collect();
    printer.columns(&rendered);
    Ok(returning
        .iter()
        .map(|column| RowColumn {
            property: column.property.to_string(),
            decode: column.expr.decode,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lit;

    crate::table! {
        mod person => "person" {
            serial: i64 => "serial",
            name: String => "name",
        }
    }

    #[test]
    fn test_insert_renders_default_token() {
        let compiled = InsertBuilder::new(person::table())
            .values(vec![("name", assign("A"))])
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "INSERT INTO \"person\" (\"serial\", \"name\") VALUES (DEFAULT, $1)"
        );
        assert_eq!(compiled.params, vec![Value::Text("A".to_string())]);
        assert!(compiled.columns.is_empty());
    }

    #[test]
    fn test_insert_many_rows() {
        let compiled = InsertBuilder::new(person::table())
            .values_many(vec![
                vec![("name", assign("A"))],
                vec![("serial", assign(7i64)), ("name", assign("B"))],
            ])
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "INSERT INTO \"person\" (\"serial\", \"name\") VALUES (DEFAULT, $1), ($2, $3)"
        );
        assert_eq!(
            compiled.params,
            vec![
                Value::Text("A".to_string()),
                Value::Int(7),
                Value::Text("B".to_string()),
            ]
        );
    }

    #[test]
    fn test_insert_on_conflict_do_nothing_with_returning() {
        let compiled = InsertBuilder::new(person::table())
            .values(vec![("serial", assign(1i64)), ("name", assign("A"))])
            .on_conflict_do_nothing(&["serial"])
            .returning(|cols| cols.serial.clone())
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "INSERT INTO \"person\" (\"serial\", \"name\") VALUES ($1, $2) \
             ON CONFLICT (\"serial\") DO NOTHING RETURNING \"serial\""
        );
        assert_eq!(compiled.columns.len(), 1);
        assert_eq!(compiled.columns[0].property, "serial");
    }

    #[test]
    fn test_insert_on_conflict_do_update_with_excluded() {
        let cols = crate::table::raw_columns(&person::table());
        let compiled = InsertBuilder::new(person::table())
            .values(vec![("serial", assign(1i64)), ("name", assign("A"))])
            .on_conflict_do_update(
                &["serial"],
                vec![("name", ColumnAssignment::Expr(excluded(&cols.name).into_expr()))],
                Some(cols.name.clone().ne(excluded(&cols.name))),
            )
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "INSERT INTO \"person\" (\"serial\", \"name\") VALUES ($1, $2) \
             ON CONFLICT (\"serial\") DO UPDATE SET \"name\" = EXCLUDED.\"name\" \
             WHERE \"name\" != EXCLUDED.\"name\""
        );
    }

    #[test]
    fn test_multi_row_conflict_returning_combination() {
        let compiled = InsertBuilder::new(person::table())
            .values_many(vec![
                vec![("name", assign("A"))],
                vec![("name", assign("B"))],
            ])
            .on_conflict_do_nothing(&["serial"])
            .returning(|cols| (cols.serial.clone(), cols.name.clone()))
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "INSERT INTO \"person\" (\"serial\", \"name\") VALUES (DEFAULT, $1), (DEFAULT, $2) \
             ON CONFLICT (\"serial\") DO NOTHING RETURNING \"serial\", \"name\""
        );
        assert_eq!(compiled.columns.len(), 2);
    }

    #[test]
    fn test_insert_without_rows_fails() {
        let result = InsertBuilder::new(person::table()).compile();
        assert!(matches!(result, Err(Error::InvalidQuery { .. })));
    }

    #[test]
    fn test_insert_unknown_column_fails() {
        let result = InsertBuilder::new(person::table())
            .values(vec![("shoe_size", assign(46i64))])
            .compile();
        assert!(matches!(result, Err(Error::ColumnNotFound { .. })));
    }

    #[test]
    fn test_returning_skips_alias_only_when_name_matches() {
        let compiled = InsertBuilder::new(person::table())
            .values(vec![("name", assign("A"))])
            .returning(|cols| cols.name.clone().concat(lit("!")).named("shout"))
            .compile()
            .unwrap();

        assert!(compiled.sql.ends_with("RETURNING \"name\" || $2 AS \"shout\""));
    }
}
