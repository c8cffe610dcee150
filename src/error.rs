use thiserror::Error;

use crate::endpoint::EndpointError;

#[derive(Error, Debug)]
pub enum ReceiptSearchError {
    #[error("Missing required parameters")]
    MissingParameters,

    #[error("Invalid customer number: {0}")]
    InvalidCustomer(String),

    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    #[error("End date must be after start date")]
    EndBeforeStart,

    #[error("Invalid day of month {0}: must be between 1 and 31")]
    InvalidDay(i64),

    #[error("Invalid meter number: {0}")]
    InvalidMeter(String),

    #[error("No reference points available to forecast from")]
    EmptyReferences,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Document endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("Search cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ReceiptSearchError {
    /// True for errors caused by the caller's request rather than by the service itself.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ReceiptSearchError::MissingParameters
                | ReceiptSearchError::InvalidCustomer(_)
                | ReceiptSearchError::InvalidDate(_)
                | ReceiptSearchError::EndBeforeStart
                | ReceiptSearchError::InvalidDay(_)
                | ReceiptSearchError::InvalidMeter(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReceiptSearchError>;
