use crate::types::YearMonth;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OvertimeError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("No ceiling for department '{department}' and no default ceiling configured")]
    MissingCeiling { department: String },

    #[error("Overtime source unavailable for {month}: {reason}")]
    SourceUnavailable { month: YearMonth, reason: String },

    #[error("Corrupt notification state: {reason}")]
    CorruptState { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type OvertimeResult<T> = Result<T, OvertimeError>;
