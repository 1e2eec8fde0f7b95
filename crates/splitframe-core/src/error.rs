//! Error types for grouping and apply operations

use std::error::Error as StdError;

use thiserror::Error;

/// Result type for data operations
pub type DataResult<T> = Result<T, DataError>;

/// Boxed error raised by a user-supplied callable
pub type CallableFailure = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that can occur during data operations
///
/// Every grouping/apply error is fatal to the call that raised it: nothing is
/// retried and no partial output is produced.
#[derive(Error, Debug)]
pub enum DataError {
    /// Arrow error (from arrow-rs)
    #[error("Arrow error: {0}")]
    Arrow(String),

    /// Column not found in DataFrame
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// Invalid column index
    #[error("invalid column index: {0}")]
    InvalidColumnIndex(usize),

    /// Type mismatch during operation
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Invalid operation for the data type
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Schema mismatch
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Index out of bounds
    #[error("index {index} out of bounds for length {length}")]
    OutOfBounds { index: usize, length: usize },

    /// Unknown column or position, or an empty match where one is required
    #[error("selector error: {0}")]
    Selector(String),

    /// Malformed spec term or colliding output names
    #[error("invalid spec term {term}: {message}")]
    SpecParse { term: usize, message: String },

    /// Key lookup failures and invalid grouped views
    #[error("grouping error: {0}")]
    Grouping(String),

    /// Inconsistent result shapes across groups or specs
    #[error("shape mismatch in {context}: {message}")]
    ShapeMismatch { context: String, message: String },

    /// A result with `found` rows cannot be spread over `expected` rows
    #[error(
        "cannot broadcast {found} rows to {expected} rows for column '{column}' \
         (spec {spec}) in group {group}"
    )]
    Broadcast {
        spec: usize,
        column: String,
        group: String,
        expected: usize,
        found: usize,
    },

    /// A user-supplied callable failed
    #[error("callable '{callable}' (spec {spec}) failed for group {group}: {source}")]
    Callable {
        spec: usize,
        callable: String,
        group: String,
        #[source]
        source: CallableFailure,
    },
}

impl DataError {
    /// Create a shape mismatch error
    pub fn shape(context: impl Into<String>, message: impl Into<String>) -> Self {
        DataError::ShapeMismatch {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a spec parse error for the term at `term`
    pub fn spec(term: usize, message: impl Into<String>) -> Self {
        DataError::SpecParse {
            term,
            message: message.into(),
        }
    }
}

impl From<arrow::error::ArrowError> for DataError {
    fn from(err: arrow::error::ArrowError) -> Self {
        DataError::Arrow(err.to_string())
    }
}
