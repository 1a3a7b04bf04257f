//! Quill Core - A compile-time-typed SQL query builder
//!
//! Quill compiles combinator-built relational expression trees into single
//! parameterized SQL statements plus typed row decoders. Builder combinators
//! produce immutable IR, the compiler merges and prunes it (dead-column
//! elimination keeps nested subqueries from widening with depth), and the
//! printer renders deterministic `$n`-parameterized SQL: identical builder
//! programs always compile to byte-identical statements.

pub mod builder;
pub mod error;
pub mod executor;
pub mod expr;
pub mod optimize;
pub mod printer;
pub mod scope;
pub mod statement;
pub mod table;
pub mod value;

// Re-export main types
pub use builder::{
    assign, excluded, query, ColumnAssignment, CompiledSelect, CompiledWrite,
    DeleteBuilderComplete, DeleteBuilderInitial, InsertBuilder, OnConflict, Projection,
    ProjectedColumn, Query, Rename, RenameCx, RowColumn, UpdateBuilder, ValuesRow,
};
pub use error::{Error, Result};
pub use executor::{ConnectionPool, DecodedRow, ExecutableModification, ExecutableQuery};
pub use expr::{
    avg, call, count, count_all, count_distinct, custom_op, if_else, lit, max, min, raw, sum,
    Aggregated, AggregateFunction, BinaryOp, Col, ColumnRef, Expr, ExprKind, Grouped,
    IntoNullable, RawPart, UnaryOp,
};
pub use printer::Printed;
pub use scope::{Name, NameSupply};
pub use statement::{JoinType, OrderBy, SelectColumn, SortDirection, Source, Statement};
pub use table::{raw_columns, ColumnDef, TableDesc, TableSchema};
pub use value::{DecodeFn, IntoValue, SqlType, Value};

/// Create a new INSERT builder for the given table
pub fn insert_into<T: TableSchema>(table: T) -> InsertBuilder<T> {
    InsertBuilder::new(table)
}

/// Create a new UPDATE builder for the given table
pub fn update<T: TableSchema>(table: T) -> UpdateBuilder<T> {
    UpdateBuilder::new(table)
}

/// Create a new DELETE builder for the given table
pub fn delete_from<T: TableSchema>(table: T) -> DeleteBuilderInitial<T> {
    DeleteBuilderInitial::new(table)
}
