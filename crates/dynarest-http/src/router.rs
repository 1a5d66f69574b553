//! REST request router.
//!
//! Resources live under a common base path:
//!
//! ```text
//! /api/v1/<resource>/                       list endpoint
//! /api/v1/<resource>/<hash_key>/            detail, hash-only table
//! /api/v1/<resource>/<hash><delim><range>/  detail, hash/range table
//! ```
//!
//! The router only separates the resource name from the key part. Splitting
//! the key on the resource's primary key delimiter and percent-decoding the
//! components is left to the resource, which knows its delimiter.

use dynarest_model::RestError;

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// A resolved request route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestRoute {
    /// Server health endpoint.
    Health,
    /// Collection endpoint of a resource.
    List {
        /// Resource name.
        resource: String,
    },
    /// Single-object endpoint of a resource.
    Detail {
        /// Resource name.
        resource: String,
        /// Raw (still percent-encoded) key part of the path.
        key: String,
    },
}

impl RestRoute {
    /// The resource this route targets, if any.
    #[must_use]
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::Health => None,
            Self::List { resource } | Self::Detail { resource, .. } => Some(resource),
        }
    }
}

/// Resolve the route of a request path against the API base path.
pub fn resolve_route(path: &str, base_path: &str) -> Result<RestRoute, RestError> {
    if path == HEALTH_PATH {
        return Ok(RestRoute::Health);
    }

    let not_found = || RestError::not_found(format!("No endpoint matches '{path}'"));
    let rest = path
        .strip_prefix(base_path.trim_end_matches('/'))
        .and_then(|p| p.strip_prefix('/'))
        .ok_or_else(not_found)?;
    let rest = rest.strip_suffix('/').unwrap_or(rest);

    match rest.split_once('/') {
        None if !rest.is_empty() => Ok(RestRoute::List {
            resource: rest.to_owned(),
        }),
        Some((resource, key)) if !resource.is_empty() && !key.is_empty() => {
            Ok(RestRoute::Detail {
                resource: resource.to_owned(),
                key: key.to_owned(),
            })
        }
        _ => Err(not_found()),
    }
}
