//! Core error type for adapter operations.

use thiserror::Error;

use dynarest_model::{RestError, RestErrorCode};
use dynarest_storage::StorageError;

/// Errors raised by the adapter core.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The table definition cannot back a resource.
    #[error("schema error: {0}")]
    Schema(String),
    /// The request or configuration is malformed.
    #[error("{0}")]
    Validation(String),
    /// The requested object or endpoint does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The storage engine failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// The method is not supported on the endpoint.
    #[error("method {0} is not allowed on this endpoint")]
    Unsupported(http::Method),
}

impl AdapterError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<AdapterError> for RestError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Schema(msg) => RestError::schema(msg),
            AdapterError::Validation(msg) => RestError::validation(msg),
            AdapterError::NotFound(msg) => RestError::not_found(msg),
            AdapterError::Unsupported(method) => RestError::method_not_allowed(&method),
            AdapterError::Storage(e) => {
                // Rejections caused by the request itself are the client's fault.
                let code = match e {
                    StorageError::MissingKeyAttribute { .. }
                    | StorageError::InvalidKeyType { .. }
                    | StorageError::InvalidStartKey { .. } => RestErrorCode::ValidationError,
                    _ => RestErrorCode::StorageError,
                };
                RestError::with_message(code, e.to_string()).with_source(e)
            }
        }
    }
}
