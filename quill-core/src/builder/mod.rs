//! Query builder module

pub mod delete;
pub mod insert;
pub mod query;
pub mod update;

// Re-export types from submodules
pub use delete::{DeleteBuilderComplete, DeleteBuilderInitial};
pub use insert::{assign, excluded, ColumnAssignment, CompiledWrite, InsertBuilder, OnConflict};
pub use query::{
    query, CompiledSelect, Projection, ProjectedColumn, Query, Rename, RenameCx, RowColumn,
    ValuesRow,
};
pub use update::UpdateBuilder;
