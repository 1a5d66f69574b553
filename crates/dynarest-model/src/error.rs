//! REST error types.
//!
//! Errors leave the adapter as a JSON object `{"error": <code>, "message": ...}`
//! with the status code carried by the error value.

use std::fmt;

/// Well-known REST error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum RestErrorCode {
    /// Malformed request or parameter.
    #[default]
    ValidationError,
    /// Item or resource not found.
    NotFound,
    /// HTTP method not supported for the endpoint.
    MethodNotAllowed,
    /// Table definition cannot be used by the adapter.
    SchemaError,
    /// The storage engine rejected the operation.
    StorageError,
    /// Internal server error.
    InternalError,
}

impl RestErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::NotFound => "NotFound",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::SchemaError => "SchemaError",
            Self::StorageError => "StorageError",
            Self::InternalError => "InternalError",
        }
    }

    /// Returns the default HTTP status code for this error.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::ValidationError => http::StatusCode::BAD_REQUEST,
            Self::NotFound => http::StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::SchemaError | Self::StorageError | Self::InternalError => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for RestErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A REST error response.
#[derive(Debug)]
pub struct RestError {
    /// The error code.
    pub code: RestErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The HTTP status code.
    pub status_code: http::StatusCode,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RestError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for RestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl RestError {
    /// Create a new `RestError` from an error code.
    #[must_use]
    pub fn new(code: RestErrorCode) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create a new `RestError` with a custom message.
    #[must_use]
    pub fn with_message(code: RestErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the JSON body of this error.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.code.as_str(),
            "message": self.message,
        })
    }

    // -- Convenience constructors --

    /// Validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(RestErrorCode::ValidationError, message)
    }

    /// Item or resource not found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_message(RestErrorCode::NotFound, message)
    }

    /// Method not allowed on the endpoint.
    #[must_use]
    pub fn method_not_allowed(method: &http::Method) -> Self {
        Self::with_message(
            RestErrorCode::MethodNotAllowed,
            format!("Method {method} is not allowed"),
        )
    }

    /// Unusable table definition.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::with_message(RestErrorCode::SchemaError, message)
    }

    /// Storage engine failure.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::with_message(RestErrorCode::StorageError, message)
    }

    /// Internal server error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(RestErrorCode::InternalError, message)
    }
}

/// Create a `RestError` from an error code.
///
/// # Examples
///
/// ```
/// use dynarest_model::rest_error;
/// use dynarest_model::error::RestErrorCode;
///
/// let err = rest_error!(ValidationError);
/// assert_eq!(err.code, RestErrorCode::ValidationError);
///
/// let err = rest_error!(NotFound, "No such item");
/// assert_eq!(err.message, "No such item");
/// ```
#[macro_export]
macro_rules! rest_error {
    ($code:ident) => {
        $crate::error::RestError::new($crate::error::RestErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::RestError::with_message($crate::error::RestErrorCode::$code, $msg)
    };
}
