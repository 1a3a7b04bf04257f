//! Table declaration: descriptors and the typed column-record binding

use crate::expr::Expr;
use crate::value::{DecodeFn, SqlType};

/// Static metadata for one declared column
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// The column's SQL name
    pub sql: &'static str,
    /// The application-facing property name
    pub property: &'static str,
    /// The decode function for this column's raw cells
    pub decode: DecodeFn,
}

impl ColumnDef {
    pub fn new<T: SqlType>(sql: &'static str, property: &'static str) -> Self {
        Self {
            sql,
            property,
            decode: T::decoder(),
        }
    }
}

/// Static metadata for one declared table
#[derive(Debug, Clone)]
pub struct TableDesc {
    pub name: &'static str,
    pub columns: Vec<ColumnDef>,
}

impl TableDesc {
    pub fn new(name: &'static str, columns: Vec<ColumnDef>) -> Self {
        Self { name, columns }
    }

    /// Look up a column by SQL name
    pub fn column(&self, sql: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.sql == sql)
    }
}

/// Binds a table descriptor to its typed column-handle record.
///
/// Implementations are generated by the [`table!`](crate::table) macro; the
/// `bind` callback decides what expression each handle wraps (a fresh alias
/// when selecting, the bare column when updating or deleting).
pub trait TableSchema {
    type Columns;

    fn desc(&self) -> TableDesc;

    fn bind(&self, f: &mut dyn FnMut(&ColumnDef) -> Expr) -> Self::Columns;
}

/// Bind a table's columns directly by their SQL names, with no renaming.
///
/// This is the binding the write builders use: UPDATE and DELETE predicates
/// and RETURNING projections reference the table's own columns.
pub fn raw_columns<T: TableSchema>(table: &T) -> T::Columns {
    table.bind(&mut |def| Expr::base_column(def.sql, def.decode))
}

/// Declare a table and its typed column record.
///
/// ```
/// quill_core::table! {
///     pub mod person => "person" {
///         name: String => "name",
///         age: i64 => "age",
///     }
/// }
/// ```
///
/// This generates `person::Table` (the [`TableSchema`] handle returned by
/// `person::table()`), `person::Columns` (one typed [`Col`](crate::Col) per
/// declared column) and `person::NullableColumns` (the record a
/// `left_join` hands back).
#[macro_export]
macro_rules! table {
    (
        $vis:vis mod $name:ident => $table:literal {
            $( $field:ident : $ty:ty => $col:literal ),+ $(,)?
        }
    ) => {
        $vis mod $name {
            #[allow(unused_imports)]
            use super::*;

            #[derive(Debug, Clone, Copy)]
            pub struct Table;

            /// Create the table handle
            pub fn table() -> Table {
                Table
            }

            #[derive(Debug, Clone)]
            pub struct Columns {
                $( pub $field: $crate::Col<$ty>, )+
            }

            #[derive(Debug, Clone)]
            pub struct NullableColumns {
                $( pub $field: $crate::Col<Option<$ty>>, )+
            }

            impl $crate::TableSchema for Table {
                type Columns = Columns;

                fn desc(&self) -> $crate::TableDesc {
                    $crate::TableDesc::new(
                        $table,
                        vec![
                            $( $crate::ColumnDef::new::<$ty>($col, stringify!($field)), )+
                        ],
                    )
                }

                fn bind(
                    &self,
                    f: &mut dyn FnMut(&$crate::ColumnDef) -> $crate::Expr,
                ) -> Columns {
                    Columns {
                        $(
                            $field: $crate::Col::from_expr(
                                f(&$crate::ColumnDef::new::<$ty>($col, stringify!($field))),
                                stringify!($field),
                            ),
                        )+
                    }
                }
            }

            impl $crate::Rename for Columns {
                type Output = Columns;

                fn rename(self, cx: &mut $crate::RenameCx<'_>) -> Columns {
                    Columns {
                        $( $field: $crate::Rename::rename(self.$field, cx), )+
                    }
                }
            }

            impl $crate::IntoNullable for Columns {
                type Nullable = NullableColumns;

                fn into_nullable(self) -> NullableColumns {
                    NullableColumns {
                        $( $field: $crate::IntoNullable::into_nullable(self.$field), )+
                    }
                }
            }

            impl $crate::Projection for Columns {
                fn into_columns(self) -> Vec<$crate::ProjectedColumn> {
                    let mut columns = Vec::new();
                    $( columns.extend($crate::Projection::into_columns(self.$field)); )+
                    columns
                }
            }

            impl $crate::Projection for NullableColumns {
                fn into_columns(self) -> Vec<$crate::ProjectedColumn> {
                    let mut columns = Vec::new();
                    $( columns.extend($crate::Projection::into_columns(self.$field)); )+
                    columns
                }
            }
        }
    };
}
