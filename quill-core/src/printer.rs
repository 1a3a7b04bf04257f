//! Single-pass SQL rendering and parameterization.
//!
//! Literals become `$n` placeholders in traversal order (except bare NULLs,
//! which render inline because the target dialect cannot infer a null
//! parameter's type). Subqueries receive fresh `tN` aliases from a counter
//! local to one rendering pass.

use std::collections::BTreeSet;

use crate::expr::{AggregateFunction, Expr, ExprKind, RawPart, UnaryOp};
use crate::statement::{SelectColumn, Source, Statement};
use crate::value::Value;

/// The rendering result handed to the transport collaborator
#[derive(Debug, Clone)]
pub struct Printed {
    pub sql: String,
    pub params: Vec<Value>,
    /// Table names the statement touches, for documentation and metrics
    pub tables: BTreeSet<String>,
}

pub(crate) struct Printer {
    sql: String,
    params: Vec<Value>,
    tables: BTreeSet<String>,
    next_alias: u32,
}

/// Quote an identifier for the target dialect
pub(crate) fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl Printer {
    pub(crate) fn new() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            tables: BTreeSet::new(),
            next_alias: 0,
        }
    }

    pub(crate) fn finish(self) -> Printed {
        Printed {
            sql: self.sql,
            params: self.params,
            tables: self.tables,
        }
    }

    /// Render a full SELECT statement
    pub(crate) fn render_select(stmt: &Statement) -> Printed {
        let mut printer = Printer::new();
        printer.statement(stmt);
        printer.finish()
    }

    pub(crate) fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    pub(crate) fn table_name(&mut self, name: &str) {
        self.tables.insert(name.to_string());
        let quoted = ident(name);
        self.push(&quoted);
    }

    /// Bind one literal, rendering its placeholder
    pub(crate) fn param(&mut self, value: &Value) {
        if value.is_null() {
            self.push("NULL");
            return;
        }
        self.params.push(value.clone());
        let placeholder = format!("${}", self.params.len());
        self.push(&placeholder);
    }

    fn fresh_alias(&mut self) -> String {
        let alias = format!("t{}", self.next_alias);
        self.next_alias += 1;
        alias
    }

    pub(crate) fn statement(&mut self, stmt: &Statement) {
        self.push("SELECT ");
        if stmt.distinct {
            self.push("DISTINCT ");
        }
        self.columns(&stmt.columns);

        match &stmt.source {
            Source::Product(children) if children.is_empty() => {}
            source => {
                self.push(" FROM ");
                self.source(source);
            }
        }

        if !stmt.restricts.is_empty() {
            self.push(" WHERE ");
            for (i, restrict) in stmt.restricts.iter().enumerate() {
                if i > 0 {
                    self.push(" AND ");
                }
                self.expr(restrict);
            }
        }

        if !stmt.groups.is_empty() {
            self.push(" GROUP BY ");
            for (i, group) in stmt.groups.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.expr(group);
            }
        }

        if !stmt.ordering.is_empty() {
            self.push(" ORDER BY ");
            for (i, order) in stmt.ordering.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.expr(&order.expr);
                let direction = format!(" {}", order.direction);
                self.push(&direction);
            }
        }

        if let Some(limit) = stmt.limit {
            let clause = format!(" LIMIT {limit}");
            self.push(&clause);
        }
        if let Some(offset) = stmt.offset {
            let clause = format!(" OFFSET {offset}");
            self.push(&clause);
        }
    }

    pub(crate) fn columns(&mut self, columns: &[SelectColumn]) {
        if columns.is_empty() {
            // A statement can lose every output column to elimination while
            // its rows still matter for restriction or join cardinality.
            self.push("NULL");
            return;
        }
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            match column {
                SelectColumn::Passthrough(expr) => self.expr(expr),
                SelectColumn::Aliased { alias, expr } => {
                    self.expr(expr);
                    let as_alias = format!(" AS {}", ident(&alias.render()));
                    self.push(&as_alias);
                }
                SelectColumn::Output { property, expr } => {
                    self.expr(expr);
                    // Skip the alias when it would restate the column's name.
                    if expr.column_name().as_deref() != Some(property.as_ref()) {
                        let as_property = format!(" AS {}", ident(property));
                        self.push(&as_property);
                    }
                }
            }
        }
    }

    fn subquery(&mut self, stmt: &Statement) {
        self.push("(");
        self.statement(stmt);
        let alias = self.fresh_alias();
        let close = format!(") AS {}", ident(&alias));
        self.push(&close);
    }

    fn source(&mut self, source: &Source) {
        match source {
            Source::Table(name) => self.table_name(name),
            Source::Product(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.subquery(child);
                }
            }
            Source::Join {
                kind,
                left,
                right,
                on,
            } => {
                self.subquery(left);
                let join = format!(" {kind} JOIN ");
                self.push(&join);
                self.subquery(right);
                self.push(" ON ");
                self.expr(on);
            }
            Source::Values { first, rest } => {
                self.push("(SELECT ");
                for (i, (name, value)) in first.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.param(value);
                    let as_alias = format!(" AS {}", ident(&name.render()));
                    self.push(&as_alias);
                }
                for row in rest {
                    self.push(" UNION ALL SELECT ");
                    for (i, value) in row.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.param(value);
                    }
                }
                let alias = self.fresh_alias();
                let close = format!(") AS {}", ident(&alias));
                self.push(&close);
            }
            Source::Empty => {
                let alias = self.fresh_alias();
                let rendered = format!("(SELECT NULL LIMIT 0) AS {}", ident(&alias));
                self.push(&rendered);
            }
        }
    }

    /// Render an operand, parenthesized unless it is a bare column or
    /// literal
    pub(crate) fn operand(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Column(_) | ExprKind::Literal(_) => self.expr(expr),
            _ => {
                self.push("(");
                self.expr(expr);
                self.push(")");
            }
        }
    }

    pub(crate) fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Column(reference) => {
                let rendered = ident(&reference.render());
                if matches!(reference, crate::expr::ColumnRef::Excluded(_)) {
                    self.push("EXCLUDED.");
                }
                self.push(&rendered);
            }
            ExprKind::Literal(value) => self.param(value),
            ExprKind::Binary { op, lhs, rhs } => {
                self.operand(lhs);
                let rendered = format!(" {} ", op.as_str());
                self.push(&rendered);
                self.operand(rhs);
            }
            ExprKind::CustomBinary { op, lhs, rhs } => {
                self.operand(lhs);
                let rendered = format!(" {op} ");
                self.push(&rendered);
                self.operand(rhs);
            }
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => {
                    self.push("NOT ");
                    self.operand(operand);
                }
                UnaryOp::Neg => {
                    self.push("-");
                    self.operand(operand);
                }
                UnaryOp::IsNull => {
                    self.operand(operand);
                    self.push(" IS NULL");
                }
                UnaryOp::IsNotNull => {
                    self.operand(operand);
                    self.push(" IS NOT NULL");
                }
                UnaryOp::Abs => {
                    self.push("abs(");
                    self.expr(operand);
                    self.push(")");
                }
                UnaryOp::Sign => {
                    self.push("sign(");
                    self.expr(operand);
                    self.push(")");
                }
            },
            ExprKind::Func { name, args } => {
                self.push(name);
                self.push("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(arg);
                }
                self.push(")");
            }
            ExprKind::Cast { operand, sql_type } => {
                self.push("CAST(");
                self.expr(operand);
                let close = format!(" AS {sql_type})");
                self.push(&close);
            }
            ExprKind::Raw(parts) => {
                for part in parts {
                    match part {
                        RawPart::Text(text) => self.push(text),
                        RawPart::Input(e) => self.expr(e),
                    }
                }
            }
            ExprKind::Case {
                cond,
                then,
                otherwise,
            } => {
                self.push("CASE WHEN ");
                self.expr(cond);
                self.push(" THEN ");
                self.expr(then);
                self.push(" ELSE ");
                self.expr(otherwise);
                self.push(" END");
            }
            ExprKind::Aggregate { func, arg } => match (func, arg) {
                (AggregateFunction::CountDistinct, Some(arg)) => {
                    self.push("COUNT(DISTINCT ");
                    self.expr(arg);
                    self.push(")");
                }
                (_, Some(arg)) => {
                    let open = format!("{func}(");
                    self.push(&open);
                    self.expr(arg);
                    self.push(")");
                }
                (_, None) => self.push("COUNT(*)"),
            },
            ExprKind::InList { needle, list } => {
                self.operand(needle);
                self.push(" IN (");
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(item);
                }
                self.push(")");
            }
            ExprKind::InQuery { needle, query } => {
                self.operand(needle);
                self.push(" IN (");
                self.statement(query);
                self.push(")");
            }
            ExprKind::Exists(query) => {
                self.push("EXISTS (");
                self.statement(query);
                self.push(")");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{lit, Col};
    use crate::value::SqlType;

    fn base<T: SqlType>(name: &'static str) -> Col<T> {
        Col::from_expr(Expr::base_column(name, T::decoder()), name)
    }

    fn render(expr: &Expr) -> (String, Vec<Value>) {
        let mut printer = Printer::new();
        printer.expr(expr);
        let printed = printer.finish();
        (printed.sql, printed.params)
    }

    #[test]
    fn test_bare_operands_are_not_parenthesized() {
        let pred = base::<i64>("age").gt(lit(20));
        let (sql, params) = render(pred.expr());
        assert_eq!(sql, "\"age\" > $1");
        assert_eq!(params, vec![Value::Int(20)]);
    }

    #[test]
    fn test_compound_operands_are_parenthesized() {
        let pred = base::<i64>("age")
            .gt(lit(20))
            .and(base::<String>("name").eq(lit("A")));
        let (sql, _) = render(pred.expr());
        assert_eq!(sql, "(\"age\" > $1) AND (\"name\" = $2)");
    }

    #[test]
    fn test_params_number_in_traversal_order() {
        let pred = base::<i64>("a")
            .add(lit(1))
            .mul(base::<i64>("b").add(lit(2)));
        let (sql, params) = render(pred.expr());
        assert_eq!(sql, "(\"a\" + $1) * (\"b\" + $2)");
        assert_eq!(params, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_null_literal_renders_inline() {
        let e = lit(None::<i64>);
        let (sql, params) = render(e.expr());
        assert_eq!(sql, "NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_case_and_cast() {
        let e = crate::expr::if_else(
            base::<i64>("age").ge(lit(18)),
            lit("adult"),
            lit("minor"),
        )
        .cast::<String>("TEXT");
        let (sql, _) = render(e.expr());
        assert_eq!(
            sql,
            "CAST(CASE WHEN \"age\" >= $1 THEN $2 ELSE $3 END AS TEXT)"
        );
    }

    #[test]
    fn test_aggregate_rendering() {
        let n = crate::expr::count_all();
        let mut printer = Printer::new();
        printer.expr(&n.expr);
        assert_eq!(printer.finish().sql, "COUNT(*)");

        let d = crate::expr::count_distinct(base::<String>("city"));
        let mut printer = Printer::new();
        printer.expr(&d.expr);
        assert_eq!(printer.finish().sql, "COUNT(DISTINCT \"city\")");
    }
}
