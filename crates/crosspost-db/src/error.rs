//! Database error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

impl From<DbError> for crosspost_core::Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => crosspost_core::Error::NotFound(msg),
            other => crosspost_core::Error::Storage(other.to_string()),
        }
    }
}
