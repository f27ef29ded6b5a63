//! Error types for store access

use common::error::DatabaseError;
use thiserror::Error;

/// Error returned by every store implementation
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying database failed
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// A stored value could not be mapped onto the domain model
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    /// The referenced record does not exist or is not visible
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(DatabaseError::Query(err))
    }
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
