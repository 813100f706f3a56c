//! Core error types.

use ormkit_proto::{BackendError, ValueKind};
use thiserror::Error;

/// Errors raised while registering a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A schema with this name is already registered.
    #[error("schema '{schema}' is already defined")]
    DuplicateSchema {
        /// Schema name.
        schema: String,
    },

    /// A field specification is unusable.
    #[error("invalid field '{field}' in schema '{schema}': {reason}")]
    InvalidFieldSpec {
        /// Schema name.
        schema: String,
        /// Property name.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Save-time validation failures. The caller corrects the value and saves again.
#[derive(Debug, Error)]
pub enum ConstraintError {
    /// A slot holds a value of the wrong kind.
    #[error("field '{field}' of '{schema}' expects {expected}, got {actual}")]
    TypeMismatch {
        /// Schema name.
        schema: String,
        /// Property name.
        field: String,
        /// Declared kind.
        expected: ValueKind,
        /// Runtime kind of the rejected value.
        actual: &'static str,
    },

    /// A non-nullable slot is null.
    #[error("field '{field}' of '{schema}' must not be null")]
    MissingRequiredField {
        /// Schema name.
        schema: String,
        /// Property name.
        field: String,
    },

    /// Another row already holds the value of a unique field.
    #[error("field '{field}' of '{schema}' must be unique, {value} is already taken")]
    UniqueViolation {
        /// Schema name.
        schema: String,
        /// Property name.
        field: String,
        /// Rendered offending value.
        value: String,
    },
}

impl ConstraintError {
    /// The violating property.
    pub fn field(&self) -> &str {
        match self {
            ConstraintError::TypeMismatch { field, .. }
            | ConstraintError::MissingRequiredField { field, .. }
            | ConstraintError::UniqueViolation { field, .. } => field,
        }
    }

    /// The schema of the rejected instance.
    pub fn schema(&self) -> &str {
        match self {
            ConstraintError::TypeMismatch { schema, .. }
            | ConstraintError::MissingRequiredField { schema, .. }
            | ConstraintError::UniqueViolation { schema, .. } => schema,
        }
    }
}

/// Core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Schema registration error.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Constraint violation on save.
    #[error(transparent)]
    ConstraintViolation(#[from] ConstraintError),

    /// No schema registered under this name.
    #[error("schema '{0}' is not defined")]
    UnknownSchema(String),

    /// The schema declares no such property.
    #[error("schema '{schema}' has no property '{field}'")]
    UnknownField {
        /// Schema name.
        schema: String,
        /// Requested property.
        field: String,
    },

    /// The instance was removed or its row no longer exists.
    #[error("'{schema}' #{id} is detached from storage")]
    DetachedEntity {
        /// Schema name.
        schema: String,
        /// Identifier the instance still carries.
        id: u64,
    },

    /// The session was already committed, rolled back, or aborted.
    #[error("session is closed")]
    SessionClosed,

    /// The backing store could not be reached. The enclosing transaction was rolled back.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Any other backing store failure.
    #[error("backend error: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(reason) => Error::StorageUnavailable(reason),
            other => Error::Backend(other),
        }
    }
}

impl Error {
    /// Whether this is a save-time validation failure.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Error::ConstraintViolation(_))
    }

    /// The constraint violation, if this is one.
    pub fn as_constraint(&self) -> Option<&ConstraintError> {
        match self {
            Error::ConstraintViolation(c) => Some(c),
            _ => None,
        }
    }

    /// The offending property, where one is known.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::ConstraintViolation(c) => Some(c.field()),
            Error::Schema(SchemaError::InvalidFieldSpec { field, .. }) => Some(field),
            Error::UnknownField { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
