//! Error handling utilities for the crate
use thiserror::Error;

use reqwest::Error as ReqwestError;

/// All errors raised by this crate will be instances of BlobServiceError
#[derive(Error, Debug)]
pub enum BlobServiceError {
    #[error("No credentials. Expected environment variable AZURE_STORAGE_SAS_TOKEN to contain a SAS token")]
    NotAuthenticated(),
    #[error("No blob endpoint. Set AZURE_STORAGE_BLOB_ENDPOINT or AZURE_STORAGE_ACCOUNT")]
    MissingEndpoint(),
    #[error("The container {0} does not exist")]
    ContainerNotFound(String),
    #[error("The blob {0} does not exist")]
    BlobNotFound(String),
    #[error("Internal HTTP error: {0}")]
    HttpError(#[from] ReqwestError),
    #[error("Service rejected the request ({status} {code}): {message}")]
    ServiceError {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Invalid response from the blob service: {0}")]
    InvalidResponse(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlobServiceError {
    pub fn unknown_error(status_code: reqwest::StatusCode) -> Self {
        BlobServiceError::ServiceError {
            status: status_code.as_u16(),
            code: "Unknown".to_string(),
            message: status_code
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
        }
    }

    pub fn required(field_name: &str) -> Self {
        BlobServiceError::InvalidInput(format!("{} is required", field_name))
    }

    /// True when a create call hit a resource that is already there
    ///
    /// Callers that want create-if-absent semantics check this and carry on.
    pub fn is_already_exists(&self) -> bool {
        match self {
            BlobServiceError::ServiceError { status, code, .. } => {
                *status == 409 && code.ends_with("AlreadyExists")
            }
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BlobServiceError::ContainerNotFound(_) | BlobServiceError::BlobNotFound(_)
        )
    }

    /// A short label for reporting the failure to an operator
    pub fn kind(&self) -> &'static str {
        match self {
            BlobServiceError::NotAuthenticated() | BlobServiceError::MissingEndpoint() => {
                "configuration"
            }
            BlobServiceError::ContainerNotFound(_) | BlobServiceError::BlobNotFound(_) => {
                "not found"
            }
            BlobServiceError::HttpError(_) => "transport",
            BlobServiceError::ServiceError { .. } | BlobServiceError::InvalidResponse(_) => {
                "service"
            }
            BlobServiceError::InvalidInput(_) => "invalid input",
            BlobServiceError::Io(_) => "io",
        }
    }
}

pub(crate) type Result<T> = std::result::Result<T, BlobServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_exists_needs_conflict_status() {
        let conflict = BlobServiceError::ServiceError {
            status: 409,
            code: "ContainerAlreadyExists".to_string(),
            message: "The specified container already exists.".to_string(),
        };
        assert!(conflict.is_already_exists());
        assert_eq!(conflict.kind(), "service");

        let lease = BlobServiceError::ServiceError {
            status: 409,
            code: "LeaseIdMissing".to_string(),
            message: String::new(),
        };
        assert!(!lease.is_already_exists());
    }

    #[test]
    fn unknown_error_uses_canonical_reason() {
        let err = BlobServiceError::unknown_error(reqwest::StatusCode::SERVICE_UNAVAILABLE);
        match err {
            BlobServiceError::ServiceError {
                status, message, ..
            } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
