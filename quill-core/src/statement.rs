//! SELECT-shaped statement IR and the tree utilities the compiler needs

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::expr::Expr;
use crate::scope::Name;
use crate::value::Value;

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER"),
            JoinType::Left => write!(f, "LEFT"),
        }
    }
}

/// Sort direction for ORDER BY clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// An ORDER BY clause
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: SortDirection,
}

/// One output column of a statement
#[derive(Debug, Clone)]
pub enum SelectColumn {
    /// A column re-exposed under its own name, no alias
    Passthrough(Expr),
    /// An expression projected under a generated alias
    Aliased { alias: Name, expr: Expr },
    /// A top-level projection column, named by its application property
    Output {
        property: Cow<'static, str>,
        expr: Expr,
    },
}

impl SelectColumn {
    /// The name outer statements resolve this column by
    pub fn name(&self) -> Option<String> {
        match self {
            SelectColumn::Passthrough(expr) => expr.column_name(),
            SelectColumn::Aliased { alias, .. } => Some(alias.render()),
            SelectColumn::Output { property, .. } => Some(property.to_string()),
        }
    }

    pub fn expr(&self) -> &Expr {
        match self {
            SelectColumn::Passthrough(expr)
            | SelectColumn::Aliased { expr, .. }
            | SelectColumn::Output { expr, .. } => expr,
        }
    }

    pub fn expr_mut(&mut self) -> &mut Expr {
        match self {
            SelectColumn::Passthrough(expr)
            | SelectColumn::Aliased { expr, .. }
            | SelectColumn::Output { expr, .. } => expr,
        }
    }
}

/// Where a statement's rows come from
#[derive(Debug, Clone)]
pub enum Source {
    /// A named table
    Table(String),
    /// Cartesian product of substatements; empty means no FROM clause
    Product(Vec<Statement>),
    /// Two substatements joined on a predicate
    Join {
        kind: JoinType,
        left: Box<Statement>,
        right: Box<Statement>,
        on: Expr,
    },
    /// Inline rows: the first row carries the column specs, the remaining
    /// rows are raw parameter tuples
    Values {
        first: Vec<(Name, Value)>,
        rest: Vec<Vec<Value>>,
    },
    /// A source with no rows at all
    Empty,
}

impl Source {
    /// The nested statements this source draws from
    pub fn children_mut(&mut self) -> Vec<&mut Statement> {
        match self {
            Source::Product(children) => children.iter_mut().collect(),
            Source::Join { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            Source::Table(_) | Source::Values { .. } | Source::Empty => Vec::new(),
        }
    }
}

/// A SELECT-shaped statement
#[derive(Debug, Clone)]
pub struct Statement {
    pub columns: Vec<SelectColumn>,
    pub source: Source,
    pub restricts: Vec<Expr>,
    pub groups: Vec<Expr>,
    pub ordering: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
}

impl Statement {
    pub fn from_source(source: Source) -> Self {
        Self {
            columns: Vec::new(),
            source,
            restricts: Vec::new(),
            groups: Vec::new(),
            ordering: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
        }
    }

    /// Whether a limit or offset is attached
    pub fn has_limits(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }

    /// Map from each alias this statement itself introduces to the
    /// expression defining it
    pub fn rename_map(&self) -> HashMap<String, Expr> {
        let mut map = HashMap::new();
        for column in &self.columns {
            if let SelectColumn::Aliased { alias, expr } = column {
                map.insert(alias.render(), expr.clone());
            }
        }
        map
    }

    /// Every column name referenced by this statement's own clauses and
    /// output expressions. This is the live set its children are pruned
    /// against.
    pub fn collect_refs_into(&self, out: &mut HashSet<String>) {
        for column in &self.columns {
            column.expr().collect_refs(out);
        }
        for restrict in &self.restricts {
            restrict.collect_refs(out);
        }
        for group in &self.groups {
            group.collect_refs(out);
        }
        for order in &self.ordering {
            order.expr.collect_refs(out);
        }
        if let Source::Join { on, .. } = &self.source {
            on.collect_refs(out);
        }
    }

    /// Referenced names, including those made by embedded subqueries. Used
    /// when this statement is itself embedded inside an expression.
    pub fn collect_refs(&self, out: &mut HashSet<String>) {
        self.collect_refs_into(out);
        match &self.source {
            Source::Product(children) => {
                for child in children {
                    child.collect_refs(out);
                }
            }
            Source::Join { left, right, .. } => {
                left.collect_refs(out);
                right.collect_refs(out);
            }
            Source::Table(_) | Source::Values { .. } | Source::Empty => {}
        }
    }

    /// Apply an alias substitution to every clause of this statement (not
    /// to its children, whose aliases live in their own namespaces).
    pub fn substitute(&mut self, map: &HashMap<String, Expr>) {
        for column in &mut self.columns {
            column.expr_mut().substitute(map);
        }
        for restrict in &mut self.restricts {
            restrict.substitute(map);
        }
        for group in &mut self.groups {
            group.substitute(map);
        }
        for order in &mut self.ordering {
            order.expr.substitute(map);
        }
        if let Source::Join { on, .. } = &mut self.source {
            on.substitute(map);
        }
    }

    /// Whether a column of this statement defines an aggregate value.
    /// Aggregate columns are exempt from dead-column elimination.
    pub fn column_is_aggregate(column: &SelectColumn) -> bool {
        column.expr().contains_aggregate()
    }

    /// Count the statement's subquery nesting depth, for tests that assert
    /// restriction push-down does not add wrapping.
    pub fn depth(&self) -> usize {
        let child_depth = match &self.source {
            Source::Product(children) => {
                children.iter().map(Statement::depth).max().unwrap_or(0)
            }
            Source::Join { left, right, .. } => left.depth().max(right.depth()),
            Source::Table(_) | Source::Values { .. } | Source::Empty => 0,
        };
        child_depth + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ColumnRef, ExprKind};
    use crate::value::SqlType;

    fn aliased(hint: &'static str, ident: u32, base: &str) -> SelectColumn {
        SelectColumn::Aliased {
            alias: Name::new(hint, 0, ident),
            expr: Expr::base_column(base, String::decoder()),
        }
    }

    #[test]
    fn test_rename_map_covers_aliased_columns_only() {
        let mut stmt = Statement::from_source(Source::Table("person".into()));
        stmt.columns.push(aliased("name", 0, "name"));
        stmt.columns.push(SelectColumn::Passthrough(Expr::alias_column(
            Name::new("city", 0, 1),
            String::decoder(),
        )));
        let map = stmt.rename_map();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("name_0"));
    }

    #[test]
    fn test_substitute_rewrites_own_clauses() {
        let mut stmt = Statement::from_source(Source::Table("person".into()));
        stmt.restricts.push(Expr::alias_column(
            Name::new("age", 0, 1),
            i64::decoder(),
        ));
        let mut map = HashMap::new();
        map.insert("age_1".to_string(), Expr::base_column("age", i64::decoder()));
        stmt.substitute(&map);
        assert!(matches!(
            &stmt.restricts[0].kind,
            ExprKind::Column(ColumnRef::Base(name)) if name == "age"
        ));
    }

    #[test]
    fn test_depth() {
        let table = Statement::from_source(Source::Table("person".into()));
        assert_eq!(table.depth(), 1);
        let product = Statement::from_source(Source::Product(vec![table]));
        assert_eq!(product.depth(), 2);
    }
}
