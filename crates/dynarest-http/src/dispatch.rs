//! REST handler trait and request dispatch.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use dynarest_model::RestError;

use crate::body::RestResponseBody;
use crate::router::RestRoute;

/// A routed REST request handed to the handler.
#[derive(Debug, Clone)]
pub struct RestRequest {
    /// HTTP method.
    pub method: http::Method,
    /// Resolved route.
    pub route: RestRoute,
    /// Decoded query parameters in request order.
    pub query: Vec<(String, String)>,
    /// Raw request body.
    pub body: Bytes,
    /// Id of this request, echoed in the response headers.
    pub request_id: String,
}

/// Trait that the adapter core must implement.
///
/// The handler receives a routed request and returns a complete HTTP
/// response. This trait serves as the boundary between the HTTP transport
/// layer and the resource layer.
pub trait RestHandler: Send + Sync + 'static {
    /// Handle a REST request and produce an HTTP response.
    fn handle_request(
        &self,
        request: RestRequest,
    ) -> Pin<Box<dyn Future<Output = Result<http::Response<RestResponseBody>, RestError>> + Send>>;
}

/// Dispatch a REST request to the handler.
pub async fn dispatch_request<H: RestHandler>(
    handler: &H,
    request: RestRequest,
) -> Result<http::Response<RestResponseBody>, RestError> {
    tracing::debug!(
        method = %request.method,
        route = ?request.route,
        request_id = %request.request_id,
        "dispatching REST request"
    );
    handler.handle_request(request).await
}
