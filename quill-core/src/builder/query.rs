//! The state-threaded query builder and its combinators.
//!
//! A [`Query`] is the mutable cell threaded through an otherwise pure chain
//! of combinator calls. Nested builders (joins, aggregates, subqueries) run
//! against isolated states that share only the compile-wide name supply,
//! giving the strict stack discipline that maps onto SQL's lexical subquery
//! nesting.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::expr::{Aggregated, Col, Expr, ExprKind, Grouped, IntoNullable};
use crate::optimize::prune;
use crate::printer::Printer;
use crate::scope::{Name, NameSupply};
use crate::statement::{JoinType, OrderBy, SelectColumn, SortDirection, Source, Statement};
use crate::table::TableSchema;
use crate::value::{DecodeFn, IntoValue, SqlType, Value};

/// One projected output column: the application property it decodes under
/// and the expression producing it
#[derive(Debug, Clone)]
pub struct ProjectedColumn {
    pub property: Cow<'static, str>,
    pub expr: Expr,
}

/// Anything that can serve as a query's output row shape
pub trait Projection {
    fn into_columns(self) -> Vec<ProjectedColumn>;
}

impl<T: SqlType> Projection for Col<T> {
    fn into_columns(self) -> Vec<ProjectedColumn> {
        vec![ProjectedColumn {
            property: self.property.clone(),
            expr: self.into_expr(),
        }]
    }
}

impl Projection for Vec<ProjectedColumn> {
    fn into_columns(self) -> Vec<ProjectedColumn> {
        self
    }
}

macro_rules! projection_tuple {
    ($($name:ident),+) => {
        impl<$($name: Projection),+> Projection for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_columns(self) -> Vec<ProjectedColumn> {
                let ($($name,)+) = self;
                let mut columns = Vec::new();
                $( columns.extend($name.into_columns()); )+
                columns
            }
        }
    };
}

projection_tuple!(A);
projection_tuple!(A, B);
projection_tuple!(A, B, C);
projection_tuple!(A, B, C, D);
projection_tuple!(A, B, C, D, E);
projection_tuple!(A, B, C, D, E, F);
projection_tuple!(A, B, C, D, E, F, G);
projection_tuple!(A, B, C, D, E, F, G, H);

/// Rename context: allocates fresh aliases in the enclosing scope and
/// appends the aliased columns to the statement under construction
pub struct RenameCx<'a> {
    pub(crate) supply: Rc<RefCell<NameSupply>>,
    pub(crate) scope: u32,
    pub(crate) columns: &'a mut Vec<SelectColumn>,
}

impl RenameCx<'_> {
    pub(crate) fn add(&mut self, expr: Expr) -> Expr {
        let hint = expr.hint();
        let decode = expr.decode;
        let alias = self.supply.borrow_mut().fresh_name(hint, self.scope);
        self.columns.push(SelectColumn::Aliased {
            alias: alias.clone(),
            expr,
        });
        Expr::alias_column(alias, decode)
    }
}

/// A record of handles whose columns can be renamed to fresh aliases when
/// they cross a statement boundary (join and aggregate results)
pub trait Rename {
    type Output;

    fn rename(self, cx: &mut RenameCx<'_>) -> Self::Output;
}

impl<T: SqlType> Rename for Col<T> {
    type Output = Col<T>;

    fn rename(self, cx: &mut RenameCx<'_>) -> Col<T> {
        let property = self.property.clone();
        Col::from_expr(cx.add(self.into_expr()), property)
    }
}

impl<T: SqlType> Rename for Grouped<T> {
    type Output = Col<T>;

    fn rename(self, cx: &mut RenameCx<'_>) -> Col<T> {
        Col::from_expr(cx.add(self.expr), self.property)
    }
}

impl<T: SqlType> Rename for Aggregated<T> {
    type Output = Col<T>;

    fn rename(self, cx: &mut RenameCx<'_>) -> Col<T> {
        Col::from_expr(cx.add(self.expr), self.property)
    }
}

macro_rules! rename_tuple {
    ($($name:ident),+) => {
        impl<$($name: Rename),+> Rename for ($($name,)+) {
            type Output = ($($name::Output,)+);

            #[allow(non_snake_case)]
            fn rename(self, cx: &mut RenameCx<'_>) -> Self::Output {
                let ($($name,)+) = self;
                ($($name.rename(cx),)+)
            }
        }
    };
}

rename_tuple!(A);
rename_tuple!(A, B);
rename_tuple!(A, B, C);
rename_tuple!(A, B, C, D);
rename_tuple!(A, B, C, D, E);
rename_tuple!(A, B, C, D, E, F);
rename_tuple!(A, B, C, D, E, F, G);
rename_tuple!(A, B, C, D, E, F, G, H);

/// A row shape usable with [`Query::select_values`]: a tuple of literal
/// values plus the matching tuple of column handles
pub trait ValuesRow {
    type Names;
    type Columns;

    fn names(names: &Self::Names) -> Vec<&'static str>;
    fn decoders() -> Vec<DecodeFn>;
    fn into_values(self) -> Vec<Value>;
    fn bind_columns(names: &Self::Names, aliases: &[Name]) -> Self::Columns;
}

macro_rules! values_row {
    ($count:literal; $($name:ident . $idx:tt),+) => {
        impl<$($name: IntoValue),+> ValuesRow for ($($name,)+) {
            type Names = [&'static str; $count];
            type Columns = ($(Col<$name::Sql>,)+);

            fn names(names: &Self::Names) -> Vec<&'static str> {
                names.to_vec()
            }

            fn decoders() -> Vec<DecodeFn> {
                vec![$(<$name::Sql as SqlType>::decoder(),)+]
            }

            fn into_values(self) -> Vec<Value> {
                vec![$(self.$idx.into_value(),)+]
            }

            fn bind_columns(names: &Self::Names, aliases: &[Name]) -> Self::Columns {
                ($(
                    Col::from_expr(
                        Expr::alias_column(
                            aliases[$idx].clone(),
                            <$name::Sql as SqlType>::decoder(),
                        ),
                        names[$idx],
                    ),
                )+)
            }
        }
    };
}

values_row!(1; A.0);
values_row!(2; A.0, B.1);
values_row!(3; A.0, B.1, C.2);
values_row!(4; A.0, B.1, C.2, D.3);

/// Per-scope builder state threaded through the combinator chain
pub struct Query {
    supply: Rc<RefCell<NameSupply>>,
    scope: u32,
    sources: Vec<Statement>,
    static_restricts: Vec<Expr>,
    groups: Vec<Expr>,
}

impl Query {
    /// Fresh state for a top-level compile: scope 0, new counters
    pub(crate) fn root() -> Self {
        Self {
            supply: Rc::new(RefCell::new(NameSupply::new())),
            scope: 0,
            sources: Vec::new(),
            static_restricts: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Fresh state sharing only the naming scope, for joins and aggregates
    fn isolate(&self) -> Self {
        Self {
            supply: Rc::clone(&self.supply),
            scope: self.scope,
            sources: Vec::new(),
            static_restricts: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Fresh state in a fresh scope, for independently-compiled subqueries
    fn subquery(&self) -> Self {
        let scope = self.supply.borrow_mut().fresh_scope();
        Self {
            supply: Rc::clone(&self.supply),
            scope,
            sources: Vec::new(),
            static_restricts: Vec::new(),
            groups: Vec::new(),
        }
    }

    fn fresh_name(&self, hint: impl Into<Cow<'static, str>>) -> Name {
        self.supply.borrow_mut().fresh_name(hint, self.scope)
    }

    /// Select a table: every column is renamed to a fresh alias and a typed
    /// handle record is returned, keyed by property name.
    pub fn select<T: TableSchema>(&mut self, table: &T) -> T::Columns {
        let desc = table.desc();
        let mut stmt = Statement::from_source(Source::Table(desc.name.to_string()));
        let supply = Rc::clone(&self.supply);
        let scope = self.scope;
        let mut columns = Vec::new();
        let record = table.bind(&mut |def| {
            let alias = supply.borrow_mut().fresh_name(def.sql, scope);
            columns.push(SelectColumn::Aliased {
                alias: alias.clone(),
                expr: Expr::base_column(def.sql, def.decode),
            });
            Expr::alias_column(alias, def.decode)
        });
        stmt.columns = columns;
        self.sources.push(stmt);
        record
    }

    /// Select inline rows. Zero rows produce an empty-table source that
    /// type-checks but yields nothing; one or more rows produce an inline
    /// values source.
    pub fn select_values<R: ValuesRow>(&mut self, names: R::Names, rows: Vec<R>) -> R::Columns {
        let name_list = R::names(&names);
        let decoders = R::decoders();
        let aliases: Vec<Name> = name_list.iter().map(|n| self.fresh_name(*n)).collect();

        let mut rows = rows.into_iter();
        let stmt = match rows.next() {
            None => {
                let mut stmt = Statement::from_source(Source::Empty);
                stmt.columns = aliases
                    .iter()
                    .zip(&decoders)
                    .map(|(alias, decode)| SelectColumn::Aliased {
                        alias: alias.clone(),
                        expr: Expr::literal(Value::Null, *decode),
                    })
                    .collect();
                stmt
            }
            Some(first) => {
                let first = aliases.iter().cloned().zip(first.into_values()).collect();
                let rest = rows.map(R::into_values).collect();
                let mut stmt = Statement::from_source(Source::Values { first, rest });
                stmt.columns = aliases
                    .iter()
                    .zip(&decoders)
                    .map(|(alias, decode)| {
                        SelectColumn::Passthrough(Expr::alias_column(alias.clone(), *decode))
                    })
                    .collect();
                stmt
            }
        };
        self.sources.push(stmt);
        R::bind_columns(&names, &aliases)
    }

    /// Filter rows. Before any source exists the predicate is deferred;
    /// against a lone pushable source it merges into that source's own
    /// WHERE; otherwise the current sources fold into a product carrying
    /// the predicate.
    pub fn restrict(&mut self, predicate: Col<bool>) {
        let predicate = predicate.into_expr();
        if self.sources.is_empty() {
            self.static_restricts.push(predicate);
            return;
        }
        if self.sources.len() == 1 && Self::can_push(&self.sources[0], &predicate) {
            let stmt = &mut self.sources[0];
            let mut predicate = predicate;
            predicate.substitute(&stmt.rename_map());
            stmt.restricts.push(predicate);
            return;
        }
        let mut product = self.wrap_product();
        product.restricts.push(predicate);
        self.sources.push(product);
    }

    /// Whether a predicate can merge into this statement's own WHERE
    /// without changing meaning or dangling a reference
    fn can_push(stmt: &Statement, predicate: &Expr) -> bool {
        if stmt.has_limits() || stmt.distinct || !stmt.groups.is_empty() {
            return false;
        }
        let map = stmt.rename_map();
        let mut refs = HashSet::new();
        predicate.collect_refs(&mut refs);
        let substitutable = refs.iter().all(|name| match map.get(name) {
            Some(definition) => !definition.contains_aggregate(),
            None => true,
        });
        let mut embedded = HashSet::new();
        predicate.collect_embedded_refs(&mut embedded);
        substitutable && embedded.iter().all(|name| !map.contains_key(name))
    }

    /// Record a grouping column for the enclosing aggregate
    pub fn group_by<T: SqlType>(&mut self, col: &Col<T>) -> Grouped<T> {
        self.groups.push(col.expr().clone());
        Grouped::from_parts(col.expr().clone(), col.property.clone())
    }

    /// Run `f` in isolation, wrap its sources into a grouped product, and
    /// re-expose the selected grouping and aggregate columns under fresh
    /// aliases.
    pub fn aggregate<R, F>(&mut self, f: F) -> R::Output
    where
        R: Rename,
        F: FnOnce(&mut Query) -> R,
    {
        let mut inner = self.isolate();
        let record = f(&mut inner);
        let mut stmt = inner.wrap_all();
        stmt.groups = std::mem::take(&mut inner.groups);
        let output = {
            let mut cx = RenameCx {
                supply: Rc::clone(&self.supply),
                scope: self.scope,
                columns: &mut stmt.columns,
            };
            record.rename(&mut cx)
        };
        self.sources.push(stmt);
        output
    }

    /// `INNER JOIN` against another table
    pub fn join<T, O>(&mut self, table: &T, on: O) -> T::Columns
    where
        T: TableSchema,
        T::Columns: Rename<Output = T::Columns>,
        O: FnOnce(&T::Columns) -> Col<bool>,
    {
        self.join_with(|q| q.select(table), on)
    }

    /// `LEFT JOIN` against another table. The returned columns are
    /// presented as nullable: an unmatched left row yields SQL NULL for
    /// every right-hand column.
    pub fn left_join<T, O>(&mut self, table: &T, on: O) -> <T::Columns as IntoNullable>::Nullable
    where
        T: TableSchema,
        T::Columns: Rename<Output = T::Columns> + IntoNullable,
        O: FnOnce(&T::Columns) -> Col<bool>,
    {
        self.left_join_with(|q| q.select(table), on)
    }

    /// `INNER JOIN` against an arbitrary right-hand builder
    pub fn join_with<R, F, O>(&mut self, f: F, on: O) -> R::Output
    where
        R: Rename,
        F: FnOnce(&mut Query) -> R,
        O: FnOnce(&R::Output) -> Col<bool>,
    {
        self.join_inner(JoinType::Inner, f, on)
    }

    /// `LEFT JOIN` against an arbitrary right-hand builder
    pub fn left_join_with<R, F, O>(&mut self, f: F, on: O) -> <R::Output as IntoNullable>::Nullable
    where
        R: Rename,
        R::Output: IntoNullable,
        F: FnOnce(&mut Query) -> R,
        O: FnOnce(&R::Output) -> Col<bool>,
    {
        self.join_inner(JoinType::Left, f, on).into_nullable()
    }

    fn join_inner<R, F, O>(&mut self, kind: JoinType, f: F, on: O) -> R::Output
    where
        R: Rename,
        F: FnOnce(&mut Query) -> R,
        O: FnOnce(&R::Output) -> Col<bool>,
    {
        let mut sub = self.isolate();
        let record = f(&mut sub);
        let right = sub.collapse();
        let left = self.collapse();

        // Right columns are renamed at this level; left columns pass
        // through under their existing names.
        let mut columns = Vec::new();
        let renamed = {
            let mut cx = RenameCx {
                supply: Rc::clone(&self.supply),
                scope: self.scope,
                columns: &mut columns,
            };
            record.rename(&mut cx)
        };
        let join_renames: HashMap<String, Expr> = columns
            .iter()
            .filter_map(|column| match column {
                SelectColumn::Aliased { alias, expr } => Some((alias.render(), expr.clone())),
                _ => None,
            })
            .collect();
        for column in &left.columns {
            if let Some(expr) = Self::exposed(column) {
                columns.push(SelectColumn::Passthrough(expr));
            }
        }

        // The ON predicate is written against the renamed columns; rewrite
        // those references back to the right side's own outputs, which are
        // what the ON clause can see.
        let mut on_expr = on(&renamed).into_expr();
        on_expr.substitute(&join_renames);

        let mut stmt = Statement::from_source(Source::Join {
            kind,
            left: Box::new(left),
            right: Box::new(right),
            on: on_expr,
        });
        stmt.columns = columns;
        self.sources.push(stmt);
        renamed
    }

    /// Attach an ordering. With a single accumulated source the clause
    /// concatenates onto that source's ordering; otherwise the sources fold
    /// into a product first.
    pub fn order_by<T: SqlType>(&mut self, col: &Col<T>, direction: SortDirection) {
        self.fold_single();
        if Self::embedded_conflict(self.sources.last().expect("source"), col.expr()) {
            let product = self.wrap_product();
            self.sources.push(product);
        }
        let stmt = self.sources.last_mut().expect("source");
        let mut expr = col.expr().clone();
        expr.substitute(&stmt.rename_map());
        stmt.ordering.push(OrderBy { expr, direction });
    }

    /// `ORDER BY col ASC`
    pub fn order_by_asc<T: SqlType>(&mut self, col: &Col<T>) {
        self.order_by(col, SortDirection::Asc);
    }

    /// `ORDER BY col DESC`
    pub fn order_by_desc<T: SqlType>(&mut self, col: &Col<T>) {
        self.order_by(col, SortDirection::Desc);
    }

    /// Cap the row count
    pub fn limit(&mut self, count: u64) {
        self.fold_single();
        self.sources.last_mut().expect("source").limit = Some(count);
    }

    /// Skip leading rows
    pub fn offset(&mut self, count: u64) {
        self.fold_single();
        self.sources.last_mut().expect("source").offset = Some(count);
    }

    /// Deduplicate output rows
    pub fn distinct(&mut self) {
        self.fold_single();
        self.sources.last_mut().expect("source").distinct = true;
    }

    /// Membership test against an independently-compiled subquery
    pub fn in_query<T, F>(&mut self, needle: Col<T>, f: F) -> Col<bool>
    where
        T: SqlType,
        F: FnOnce(&mut Query) -> Col<T>,
    {
        let mut sub = self.subquery();
        let result = f(&mut sub);
        let projection = vec![ProjectedColumn {
            property: result.property.clone(),
            expr: result.into_expr(),
        }];
        let stmt = sub.finish_projection(projection);
        let property = needle.property.clone();
        Col::from_expr(
            Expr::new(
                ExprKind::InQuery {
                    needle: Box::new(needle.into_expr()),
                    query: Box::new(stmt),
                },
                bool::decoder(),
            ),
            property,
        )
    }

    /// Existence test against an independently-compiled subquery
    pub fn exists<P, F>(&mut self, f: F) -> Col<bool>
    where
        P: Projection,
        F: FnOnce(&mut Query) -> P,
    {
        let mut sub = self.subquery();
        let projection = f(&mut sub).into_columns();
        let stmt = sub.finish_projection(projection);
        Col::from_expr(
            Expr::new(ExprKind::Exists(Box::new(stmt)), bool::decoder()),
            "exists",
        )
    }

    /// Expose one of a statement's output columns to an enclosing product
    fn exposed(column: &SelectColumn) -> Option<Expr> {
        match column {
            SelectColumn::Passthrough(expr) => Some(expr.clone()),
            SelectColumn::Aliased { alias, expr } => {
                Some(Expr::alias_column(alias.clone(), expr.decode))
            }
            SelectColumn::Output { .. } => None,
        }
    }

    /// Fold all current sources into one product statement exposing every
    /// column of every source
    fn wrap_product(&mut self) -> Statement {
        let children = std::mem::take(&mut self.sources);
        let columns = children
            .iter()
            .flat_map(|child| child.columns.iter())
            .filter_map(Self::exposed)
            .map(SelectColumn::Passthrough)
            .collect();
        let mut stmt = Statement::from_source(Source::Product(children));
        stmt.columns = columns;
        stmt
    }

    /// Ensure exactly one accumulated source
    fn fold_single(&mut self) {
        if self.sources.len() != 1 {
            let product = self.wrap_product();
            self.sources.push(product);
        }
    }

    /// Merge this state into a single statement: a lone source is reused,
    /// several fold into a product, none yields a bare select. Pending
    /// static restricts attach here.
    fn collapse(&mut self) -> Statement {
        let mut stmt = match self.sources.len() {
            1 => self.sources.pop().expect("source"),
            _ => self.wrap_product(),
        };
        stmt.restricts.extend(std::mem::take(&mut self.static_restricts));
        stmt
    }

    /// Like [`collapse`](Query::collapse), but always wraps sources into a
    /// product, as the aggregate combinator requires
    fn wrap_all(&mut self) -> Statement {
        let mut stmt = self.wrap_product();
        stmt.restricts.extend(std::mem::take(&mut self.static_restricts));
        stmt
    }

    fn embedded_conflict(stmt: &Statement, expr: &Expr) -> bool {
        let mut embedded = HashSet::new();
        expr.collect_embedded_refs(&mut embedded);
        if embedded.is_empty() {
            return false;
        }
        let map = stmt.rename_map();
        embedded.iter().any(|name| map.contains_key(name))
    }

    /// Close this builder over its final output columns: merge sources,
    /// rewrite the projection against the merged statement, and run
    /// dead-column elimination.
    pub(crate) fn finish_projection(&mut self, projection: Vec<ProjectedColumn>) -> Statement {
        let mut stmt = self.collapse();
        let map = stmt.rename_map();

        // References made from inside embedded subqueries cannot be
        // rewritten; when one names an alias this statement defines, keep
        // the statement as a child so the alias stays visible.
        let mut embedded = HashSet::new();
        for column in &projection {
            column.expr.collect_embedded_refs(&mut embedded);
        }
        for restrict in &stmt.restricts {
            restrict.collect_embedded_refs(&mut embedded);
        }
        let conflict = embedded.iter().any(|name| map.contains_key(name));
        let map = if conflict {
            let child = stmt;
            stmt = Statement::from_source(Source::Product(vec![child]));
            HashMap::new()
        } else {
            map
        };

        stmt.columns = projection
            .into_iter()
            .map(|column| {
                let mut expr = column.expr;
                expr.substitute(&map);
                SelectColumn::Output {
                    property: column.property,
                    expr,
                }
            })
            .collect();
        prune(&mut stmt);
        stmt
    }
}

/// One output column of a compiled SELECT: the application property name
/// and the decode function the row-decoding collaborator applies to it
#[derive(Debug, Clone)]
pub struct RowColumn {
    pub property: String,
    pub decode: DecodeFn,
}

/// A compiled SELECT: SQL text, ordered bind parameters, the output row
/// shape, and the set of referenced tables
#[derive(Debug, Clone)]
pub struct CompiledSelect {
    pub sql: String,
    pub params: Vec<Value>,
    pub columns: Vec<RowColumn>,
    pub tables: BTreeSet<String>,
}

/// Compile a builder program into one parameterized SELECT statement.
///
/// Every call starts from a fresh name supply, so structurally identical
/// programs compile to byte-identical SQL and parameter lists.
pub fn query<P, F>(f: F) -> Result<CompiledSelect>
where
    P: Projection,
    F: FnOnce(&mut Query) -> P,
{
    let mut q = Query::root();
    let projection = f(&mut q).into_columns();
    if projection.is_empty() {
        return Err(Error::invalid_query(
            "query requires at least one output column",
        ));
    }
    let columns: Vec<RowColumn> = projection
        .iter()
        .map(|column| RowColumn {
            property: column.property.to_string(),
            decode: column.expr.decode,
        })
        .collect();
    let stmt = q.finish_projection(projection);
    let printed = Printer::render_select(&stmt);
    tracing::debug!(sql = %printed.sql, params = printed.params.len(), "compiled select");
    Ok(CompiledSelect {
        sql: printed.sql,
        params: printed.params,
        columns,
        tables: printed.tables,
    })
}
