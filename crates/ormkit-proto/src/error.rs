//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A declared type name does not name a known value kind.
    #[error("unknown value kind '{0}'")]
    UnknownKind(String),

    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Errors reported by a backing store while executing statements.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The store could not be reached or failed at the transport level.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A statement referenced a table that was never created.
    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    /// A table already exists with a different definition.
    #[error("table '{table}' already exists with a different definition")]
    TableMismatch {
        /// Table name.
        table: String,
    },

    /// The store rejected a write because a unique column already holds the value.
    #[error("unique column '{column}' of table '{table}' already contains {value}")]
    UniqueViolation {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Rendered offending value.
        value: String,
    },

    /// Stored bytes could not be decoded.
    #[error("corrupt data: {0}")]
    Corrupt(String),
}

impl BackendError {
    /// Whether this error came from the transport rather than the data.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }
}
