use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Balance continuity broken on {date}: expected opening {expected}, found {found}")]
    ContinuityViolation {
        date: NaiveDate,
        expected: i64,
        found: i64,
    },

    #[error("Unknown session label: {0}")]
    InvalidSession(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failure reported by an external data source, passed through untouched.
    #[error(transparent)]
    Source(Box<dyn std::error::Error + Send + Sync>),
}

impl WarehouseError {
    pub fn source_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Source(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, WarehouseError>;
