use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::error::{ErrorMessage, HttpError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid JSON payload: {0}")]
    InvalidPayload(String),

    #[error("Gateway signing key is not configured")]
    MissingSigningKey,

    #[error("Missing signature header")]
    MissingSignature,

    #[error("Missing timestamp header")]
    MissingTimestamp,

    #[error("Signature does not match payload")]
    SignatureMismatch,

    #[error("No user could be resolved from the event")]
    UnresolvableUser,

    #[error("Gateway sent a negative {0}")]
    NegativeAmount(String),

    #[error("Net amount {0} is not positive")]
    NonPositiveAmount(String),

    #[error("Invoice {0} has a non-positive total")]
    NonPositiveInvoiceTotal(String),

    #[error("User {0} does not exist")]
    UnknownUser(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Gateway error: {0}")]
    Gateway(String),
}

impl ServiceError {
    /// Failures the gateway should resolve by redelivering the event.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Database(_) | ServiceError::Timeout(_) | ServiceError::Gateway(_)
        )
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::InvalidPayload(_) => {
                HttpError::bad_request(ErrorMessage::InvalidJson.to_string())
            }
            ServiceError::MissingSigningKey => HttpError::misconfigured(),
            ServiceError::MissingSignature => {
                HttpError::unauthorized(ErrorMessage::MissingSignature.to_string())
            }
            ServiceError::MissingTimestamp => {
                HttpError::unauthorized(ErrorMessage::MissingTimestamp.to_string())
            }
            ServiceError::SignatureMismatch => {
                HttpError::unauthorized(ErrorMessage::InvalidSignature.to_string())
            }
            ServiceError::UnresolvableUser => {
                HttpError::bad_request(ErrorMessage::UnresolvableUser.to_string())
            }
            ServiceError::NegativeAmount(_) => {
                HttpError::bad_request(ErrorMessage::NegativeAmount.to_string())
            }
            ServiceError::NonPositiveAmount(_) => {
                HttpError::bad_request(ErrorMessage::NonPositiveAmount.to_string())
            }
            ServiceError::NonPositiveInvoiceTotal(_) => {
                HttpError::bad_request(ErrorMessage::NonPositiveInvoiceTotal.to_string())
            }
            ServiceError::UnknownUser(_) => {
                HttpError::bad_request(ErrorMessage::UnknownUser.to_string())
            }
            // Internal details stay in the logs
            ServiceError::Database(_) | ServiceError::Timeout(_) | ServiceError::Gateway(_) => {
                HttpError::server_error(ErrorMessage::PersistenceFailure.to_string())
            }
        }
    }
}
