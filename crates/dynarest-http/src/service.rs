//! REST HTTP service implementing the hyper `Service` trait.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;

use dynarest_model::RestError;

use crate::body::RestResponseBody;
use crate::dispatch::{RestHandler, RestRequest, dispatch_request};
use crate::response::{
    CONTENT_TYPE, REQUEST_ID_HEADER, empty_response, error_to_response, json_response,
};
use crate::router::{RestRoute, resolve_route};

/// Server version reported by the health endpoint.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for the REST HTTP service.
#[derive(Debug, Clone)]
pub struct RestHttpConfig {
    /// Base path every resource lives under, e.g. `/api/v1`.
    pub base_path: String,
}

impl Default for RestHttpConfig {
    fn default() -> Self {
        Self {
            base_path: "/api/v1".to_owned(),
        }
    }
}

/// Hyper `Service` implementation for the REST API.
///
/// Wraps a [`RestHandler`] implementation and routes incoming HTTP requests
/// to it.
#[derive(Debug)]
pub struct RestHttpService<H: RestHandler> {
    handler: Arc<H>,
    config: Arc<RestHttpConfig>,
}

impl<H: RestHandler> RestHttpService<H> {
    /// Create a new `RestHttpService`.
    pub fn new(handler: Arc<H>, config: RestHttpConfig) -> Self {
        Self {
            handler,
            config: Arc::new(config),
        }
    }
}

impl<H: RestHandler> Clone for RestHttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H: RestHandler> hyper::service::Service<http::Request<Incoming>> for RestHttpService<H> {
    type Response = http::Response<RestResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let config = Arc::clone(&self.config);
        let request_id = uuid::Uuid::new_v4().to_string();

        Box::pin(async move {
            let response = process_request(req, handler.as_ref(), &config, &request_id).await;
            let response = add_common_headers(response, &request_id);
            Ok(response)
        })
    }
}

/// Process a single REST HTTP request through the full pipeline.
async fn process_request<H: RestHandler>(
    req: http::Request<Incoming>,
    handler: &H,
    config: &RestHttpConfig,
    request_id: &str,
) -> http::Response<RestResponseBody> {
    let (parts, incoming) = req.into_parts();

    // 1. Route.
    let route = match resolve_route(parts.uri.path(), &config.base_path) {
        Ok(route) => route,
        Err(err) => return error_to_response(&err, request_id),
    };

    // 2. Answer health checks and CORS preflight without the handler.
    if route == RestRoute::Health {
        let body = serde_json::json!({ "status": "running", "version": VERSION });
        return json_response(
            http::StatusCode::OK,
            body.to_string().into_bytes(),
            request_id,
        );
    }
    if parts.method == http::Method::OPTIONS {
        return preflight_response(request_id);
    }

    // 3. Collect body.
    let body = match collect_body(incoming).await {
        Ok(body) => body,
        Err(err) => return error_to_response(&err, request_id),
    };

    // 4. Decode the query string.
    let query = parts
        .uri
        .query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    // 5. Dispatch to handler.
    let request = RestRequest {
        method: parts.method,
        route,
        query,
        body,
        request_id: request_id.to_owned(),
    };
    match dispatch_request(handler, request).await {
        Ok(response) => response,
        Err(err) => error_to_response(&err, request_id),
    }
}

/// Collect the incoming body into a single `Bytes` buffer.
async fn collect_body(incoming: Incoming) -> Result<Bytes, RestError> {
    incoming
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| RestError::internal_error(format!("Failed to read request body: {e}")))
}

fn preflight_response(request_id: &str) -> http::Response<RestResponseBody> {
    let mut response = empty_response(http::StatusCode::NO_CONTENT, request_id);
    let headers = response.headers_mut();
    headers.insert(
        "access-control-allow-methods",
        http::HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        http::HeaderValue::from_static("content-type"),
    );
    response
}

/// Add common response headers to every response.
fn add_common_headers(
    mut response: http::Response<RestResponseBody>,
    request_id: &str,
) -> http::Response<RestResponseBody> {
    let has_body = !matches!(response.body(), RestResponseBody::Empty);
    let headers = response.headers_mut();

    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.entry(REQUEST_ID_HEADER).or_insert(hv);
    }

    if has_body {
        headers
            .entry(http::header::CONTENT_TYPE)
            .or_insert(http::HeaderValue::from_static(CONTENT_TYPE));
    }

    headers.insert("server", http::HeaderValue::from_static("DynaRest"));

    // CORS headers.
    headers.insert(
        "access-control-allow-origin",
        http::HeaderValue::from_static("*"),
    );

    response
}
