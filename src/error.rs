use thiserror::Error;

#[derive(Error, Debug)]
pub enum SigError {
    #[error("Invalid chart-of-accounts entry '{prefix}': {details}")]
    InvalidMapping { prefix: String, details: String },

    #[error("Chart of accounts has no entries")]
    EmptyChart,

    #[error("Invalid quarter {0}: must be between 1 and 4")]
    InvalidQuarter(u32),

    #[error("Invalid month {0}: must be between 1 and 12")]
    InvalidMonth(u32),

    #[error("Unknown indicator code: {0}")]
    UnknownIndicator(String),

    #[error("Ledger source error: {0}")]
    Source(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SigError>;
