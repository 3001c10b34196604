//! Unified error types for all layers of the adapter.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for the Stele data-access layer.
///
/// Not-found is never an error here: single-result lookups return
/// `Ok(None)`. Provider failures are carried through [`Self::Database`]
/// without translation, retries, or suppression.
#[derive(Error, Debug)]
pub enum SteleError {
    /// The operation needs configuration the mapped type does not carry
    /// (e.g. a created/last-modified column), or an entry point was used
    /// with a query shape it rejects.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// No persistence service is registered under the logical database id.
    #[error("Unknown database: {0}")]
    UnknownDatabase(String),

    /// The entity is not managed by the persistence context.
    #[error("Detached entity: {0}")]
    Detached(String),

    /// A filter expression could not be parsed, or its parameter count
    /// does not match the supplied positional values.
    #[error("Invalid filter expression: {0}")]
    InvalidExpression(String),

    /// Entity <-> record conversion failed.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Failure raised by the underlying persistence provider.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SteleError {
    /// Creates an unsupported-operation error.
    #[must_use]
    pub fn unsupported<T: Into<String>>(message: T) -> Self {
        Self::Unsupported(message.into())
    }

    /// Fails with an unsupported-operation error when `condition` holds.
    pub fn unsupported_if<T: Into<String>>(condition: bool, message: T) -> Result<(), Self> {
        if condition {
            Err(Self::Unsupported(message.into()))
        } else {
            Ok(())
        }
    }

    /// Creates an unknown-database error.
    #[must_use]
    pub fn unknown_database<T: Into<String>>(db_id: T) -> Self {
        Self::UnknownDatabase(db_id.into())
    }

    /// Creates an invalid-expression error.
    #[must_use]
    pub fn invalid_expression<T: Into<String>>(message: T) -> Self {
        Self::InvalidExpression(message.into())
    }

    /// Creates a detached-entity error.
    #[must_use]
    pub fn detached<T: Into<String>>(message: T) -> Self {
        Self::Detached(message.into())
    }

    /// Creates a mapping error.
    #[must_use]
    pub fn mapping<T: Into<String>>(message: T) -> Self {
        Self::Mapping(message.into())
    }

    /// Creates a database error.
    #[must_use]
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks whether this is an unsupported-operation error.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for SteleError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    Self::Database(format!("[{}] {}", code, db_err.message()))
                } else {
                    Self::Database(db_err.message().to_string())
                }
            }
            sqlx::Error::ColumnNotFound(col) => {
                Self::Database(format!("Column not found: {col}"))
            }
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SteleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Mapping(format!("JSON conversion error: {err}"))
    }
}
