//! Error types shared by the data layer and everything built on top of it.
//!
//! Two classes of failure matter to callers:
//! - **NotFound**: a referenced movie or user does not exist
//! - **Unavailable**: a store could not be read or written
//!
//! Parse and validation errors only surface while loading data files or
//! accepting a new rating.

use thiserror::Error;

/// Errors raised by parsing, indexing and the store contracts
#[derive(Error, Debug)]
pub enum DataError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line in data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    Parse {
        file: String,
        line: usize,
        reason: String,
    },

    /// Expected number of fields in a line doesn't match actual
    #[error("Expected {expected} fields but found {found} in line {line}")]
    FieldCountMismatch {
        expected: usize,
        found: usize,
        line: usize,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Referenced entity doesn't exist
    #[error("{entity} with id {id} not found")]
    NotFound { entity: String, id: u32 },

    /// The backing store could not serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Data validation failed
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl DataError {
    pub fn movie_not_found(id: u32) -> Self {
        DataError::NotFound {
            entity: "Movie".to_string(),
            id,
        }
    }

    /// True for the "referenced entity is absent" class of errors
    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::NotFound { .. })
    }
}

/// Convenience type alias for Results in the data layer
pub type Result<T> = std::result::Result<T, DataError>;
