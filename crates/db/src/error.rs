use thiserror::Error;
use tokio_postgres::error::SqlState;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested record does not exist or belongs to someone else.
    #[error("record not found")]
    NotFound,
    /// A uniqueness rule was hit: slug taken or attempt already scored.
    #[error("record already exists")]
    AlreadyExists,
    /// A check constraint rejected the input.
    #[error("input rejected by the database")]
    BadInput,
    /// Unrecoverable error.
    #[error("unrecoverable storage error")]
    Fatal,
}

impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        let Some(db) = err.as_db_error() else {
            log::error!("database failure: {err}");
            return Self::Fatal;
        };

        match (db.code(), db.constraint()) {
            (&SqlState::UNIQUE_VIOLATION, Some("practice_slug_key" | "practice_attempt_completed_key")) => {
                Self::AlreadyExists
            }
            (&SqlState::FOREIGN_KEY_VIOLATION, Some("practice_attempt_practice_fkey")) => Self::NotFound,
            (&SqlState::CHECK_VIOLATION, Some(_)) => Self::BadInput,
            _ => {
                log::error!("unexpected database error {}: {}", db.code().code(), db.message());
                Self::Fatal
            }
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
