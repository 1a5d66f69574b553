//! REST response serialization and error formatting.

use dynarest_model::RestError;

use crate::body::RestResponseBody;

/// Content type for JSON responses.
pub const CONTENT_TYPE: &str = "application/json";

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Serialize a REST error into a JSON response body.
///
/// ```json
/// {
///   "error": "ValidationError",
///   "message": "limit must be a positive integer"
/// }
/// ```
#[must_use]
pub fn error_to_json(error: &RestError) -> Vec<u8> {
    error.to_json().to_string().into_bytes()
}

/// Convert a `RestError` into a complete HTTP error response.
#[must_use]
pub fn error_to_response(error: &RestError, request_id: &str) -> http::Response<RestResponseBody> {
    json_response(error.status_code, error_to_json(error), request_id)
}

/// Build a response from JSON bytes.
#[must_use]
pub fn json_response(
    status: http::StatusCode,
    json: Vec<u8>,
    request_id: &str,
) -> http::Response<RestResponseBody> {
    let mut response = http::Response::new(RestResponseBody::from_json(json));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static(CONTENT_TYPE),
    );
    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, hv);
    }
    response
}

/// Build a response without a body.
#[must_use]
pub fn empty_response(status: http::StatusCode, request_id: &str) -> http::Response<RestResponseBody> {
    let mut response = http::Response::new(RestResponseBody::empty());
    *response.status_mut() = status;
    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, hv);
    }
    response
}

/// Set the `Location` header of a response.
#[must_use]
pub fn with_location(
    mut response: http::Response<RestResponseBody>,
    location: &str,
) -> http::Response<RestResponseBody> {
    if let Ok(hv) = http::HeaderValue::from_str(location) {
        response.headers_mut().insert(http::header::LOCATION, hv);
    }
    response
}
