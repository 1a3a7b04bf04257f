//! Liveness-based dead-column elimination.
//!
//! Every join/aggregate/order/limit/distinct step conservatively re-exposes
//! all columns of its inputs; without this pass column lists would grow with
//! nesting depth. A nested column survives when its name is referenced by
//! the enclosing statement's clauses or output expressions, or when it
//! defines an aggregate (dropping those could change GROUP BY semantics
//! observed elsewhere).

use std::collections::HashSet;

use crate::statement::Statement;

/// Drop dead columns from every nested statement, recursively.
///
/// The top statement's own output list is the caller's projection and is
/// never filtered.
pub fn prune(stmt: &mut Statement) {
    let mut live = HashSet::new();
    stmt.collect_refs_into(&mut live);
    for child in stmt.source.children_mut() {
        child.columns.retain(|column| {
            let kept_by_name = column
                .name()
                .map(|name| live.contains(&name))
                .unwrap_or(true);
            kept_by_name || Statement::column_is_aggregate(column)
        });
        prune(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{AggregateFunction, Expr, ExprKind};
    use crate::scope::Name;
    use crate::statement::{SelectColumn, Source};
    use crate::value::SqlType;

    fn table_stmt(aliases: &[(&'static str, u32, &str)]) -> Statement {
        let mut stmt = Statement::from_source(Source::Table("person".into()));
        for (hint, ident, base) in aliases {
            stmt.columns.push(SelectColumn::Aliased {
                alias: Name::new(*hint, 0, *ident),
                expr: Expr::base_column(*base, String::decoder()),
            });
        }
        stmt
    }

    #[test]
    fn test_unreferenced_columns_are_dropped() {
        let child = table_stmt(&[("name", 0, "name"), ("age", 1, "age")]);
        let mut top = Statement::from_source(Source::Product(vec![child]));
        top.columns.push(SelectColumn::Output {
            property: "name".into(),
            expr: Expr::alias_column(Name::new("name", 0, 0), String::decoder()),
        });

        prune(&mut top);

        let Source::Product(children) = &top.source else {
            panic!("expected product source");
        };
        assert_eq!(children[0].columns.len(), 1);
        assert_eq!(children[0].columns[0].name().unwrap(), "name_0");
    }

    #[test]
    fn test_restrict_references_keep_columns_alive() {
        let child = table_stmt(&[("name", 0, "name"), ("age", 1, "age")]);
        let mut top = Statement::from_source(Source::Product(vec![child]));
        top.columns.push(SelectColumn::Output {
            property: "name".into(),
            expr: Expr::alias_column(Name::new("name", 0, 0), String::decoder()),
        });
        top.restricts
            .push(Expr::alias_column(Name::new("age", 0, 1), i64::decoder()));

        prune(&mut top);

        let Source::Product(children) = &top.source else {
            panic!("expected product source");
        };
        assert_eq!(children[0].columns.len(), 2);
    }

    #[test]
    fn test_aggregate_columns_are_exempt() {
        let mut child = table_stmt(&[("name", 0, "name")]);
        child.columns.push(SelectColumn::Aliased {
            alias: Name::new("tmp", 1, 0),
            expr: Expr::new(
                ExprKind::Aggregate {
                    func: AggregateFunction::Count,
                    arg: None,
                },
                i64::decoder(),
            ),
        });
        let mut top = Statement::from_source(Source::Product(vec![child]));
        top.columns.push(SelectColumn::Output {
            property: "name".into(),
            expr: Expr::alias_column(Name::new("name", 0, 0), String::decoder()),
        });

        prune(&mut top);

        let Source::Product(children) = &top.source else {
            panic!("expected product source");
        };
        // COUNT(*) column kept even though nothing references it.
        assert_eq!(children[0].columns.len(), 2);
    }
}
