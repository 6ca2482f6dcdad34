use std::io;

use tally_domain::{TemplateId, TemplateValidationError, TransactionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),
    #[error("Recurring template not found: {0}")]
    TemplateNotFound(TemplateId),
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::TransactionNotFound(_) | CoreError::TemplateNotFound(_)
        )
    }
}

impl From<io::Error> for CoreError {
    fn from(err: io::Error) -> Self {
        CoreError::StoreUnavailable(err.to_string())
    }
}

impl From<TemplateValidationError> for CoreError {
    fn from(err: TemplateValidationError) -> Self {
        CoreError::InvalidTemplate(err.to_string())
    }
}
