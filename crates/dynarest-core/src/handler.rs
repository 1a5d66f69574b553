//! Handler bridging the HTTP layer to the registered resources.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::warn;

use dynarest_http::{RestHandler, RestRequest, RestResponseBody};
use dynarest_model::RestError;

use crate::error::AdapterError;
use crate::registry::ResourceRegistry;

/// Handler that routes requests to the resource they name.
#[derive(Debug)]
pub struct DynaRestHandler {
    registry: Arc<ResourceRegistry>,
}

impl DynaRestHandler {
    /// Create a new handler over a registry.
    #[must_use]
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self { registry }
    }
}

impl RestHandler for DynaRestHandler {
    fn handle_request(
        &self,
        request: RestRequest,
    ) -> Pin<Box<dyn Future<Output = Result<http::Response<RestResponseBody>, RestError>> + Send>>
    {
        let registry = Arc::clone(&self.registry);
        Box::pin(async move { dispatch(&registry, &request) })
    }
}

fn dispatch(
    registry: &ResourceRegistry,
    request: &RestRequest,
) -> Result<http::Response<RestResponseBody>, RestError> {
    let name = request
        .route
        .resource()
        .ok_or_else(|| RestError::not_found("no resource in request path"))?;
    let resource = registry
        .get(name)
        .ok_or_else(|| RestError::not_found(format!("unknown resource '{name}'")))?;

    resource.handle(request).map_err(|err| {
        if matches!(err, AdapterError::Storage(_) | AdapterError::Schema(_)) {
            warn!(resource = %name, method = %request.method, error = %err, "request failed");
        }
        RestError::from(err)
    })
}
