use thiserror::Error;

use crate::domain::IbanError;
use crate::resilience::ServiceUnavailable;
use crate::storage::StoreError;

/// Outcome of a failed account operation.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("operation not allowed: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Unavailable(#[from] ServiceUnavailable),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<IbanError> for ServiceError {
    fn from(e: IbanError) -> Self {
        ServiceError::Validation(format!("invalid IBAN: {e}"))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
