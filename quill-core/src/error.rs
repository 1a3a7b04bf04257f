//! Error types for Quill

use thiserror::Error;

/// The main error type for Quill operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or execution error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid query configuration
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    /// Column not found error
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// A raw result cell failed its column's decode function
    #[error("Decode error: {message}")]
    Decode { message: String },
}

/// Convenience Result type for Quill operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new invalid query error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create a new column not found error
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Create a new decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_query_error() {
        let err = Error::invalid_query("query requires at least one output column");
        assert!(matches!(err, Error::InvalidQuery { .. }));
        assert_eq!(
            err.to_string(),
            "Invalid query: query requires at least one output column"
        );
    }

    #[test]
    fn test_column_not_found_error() {
        let err = Error::column_not_found("person", "shoe_size");
        assert!(matches!(err, Error::ColumnNotFound { .. }));
        assert_eq!(
            err.to_string(),
            "Column 'shoe_size' not found in table 'person'"
        );
    }

    #[test]
    fn test_decode_error() {
        let err = Error::decode("invalid integer: 'abc'");
        assert_eq!(err.to_string(), "Decode error: invalid integer: 'abc'");
    }
}
