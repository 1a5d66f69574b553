//! Adapter and resource configuration.
//!
//! [`AdapterConfig`] carries the process-wide settings loaded from the
//! environment. [`ResourceConfig`] describes one exposed table and is built
//! explicitly with its builder.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use dynarest_storage::Table;

use crate::fields::{FieldSpec, RelatedField};

/// Default page size when a request carries no `limit`.
pub const DEFAULT_LIMIT: usize = 20;

/// Upper bound applied to any requested `limit`.
pub const MAX_LIMIT: usize = 1000;

/// Process-wide adapter configuration.
///
/// # Examples
///
/// ```
/// use dynarest_core::config::AdapterConfig;
///
/// let config = AdapterConfig::default();
/// assert_eq!(config.base_path(), "/api/v1");
/// assert_eq!(config.default_limit, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    /// Bind address of the HTTP server.
    #[builder(default = String::from("0.0.0.0:8000"))]
    pub listen: String,

    /// URL prefix in front of the API name.
    #[builder(default = String::from("/api"))]
    pub api_prefix: String,

    /// API name, the second path segment.
    #[builder(default = String::from("v1"))]
    pub api_name: String,

    /// Page size used when a request has no `limit`.
    #[builder(default = DEFAULT_LIMIT)]
    pub default_limit: usize,

    /// Cap on the requested page size.
    #[builder(default = MAX_LIMIT)]
    pub max_limit: usize,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// JSON file with the table and resource definitions to serve.
    #[builder(default)]
    pub definitions_path: Option<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            listen: String::from("0.0.0.0:8000"),
            api_prefix: String::from("/api"),
            api_name: String::from("v1"),
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            log_level: String::from("info"),
            definitions_path: None,
        }
    }
}

impl AdapterConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DYNAREST_LISTEN` | `0.0.0.0:8000` |
    /// | `DYNAREST_API_PREFIX` | `/api` |
    /// | `DYNAREST_API_NAME` | `v1` |
    /// | `DYNAREST_DEFAULT_LIMIT` | `20` |
    /// | `DYNAREST_MAX_LIMIT` | `1000` |
    /// | `LOG_LEVEL` | `info` |
    /// | `DYNAREST_DEFINITIONS` | unset |
    ///
    /// Unparseable numbers keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DYNAREST_LISTEN") {
            config.listen = v;
        }
        if let Ok(v) = std::env::var("DYNAREST_API_PREFIX") {
            config.api_prefix = v;
        }
        if let Ok(v) = std::env::var("DYNAREST_API_NAME") {
            config.api_name = v;
        }
        if let Ok(v) = std::env::var("DYNAREST_DEFAULT_LIMIT") {
            if let Some(n) = parse_positive(&v) {
                config.default_limit = n;
            }
        }
        if let Ok(v) = std::env::var("DYNAREST_MAX_LIMIT") {
            if let Some(n) = parse_positive(&v) {
                config.max_limit = n;
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("DYNAREST_DEFINITIONS") {
            if !v.is_empty() {
                config.definitions_path = Some(v);
            }
        }

        config
    }

    /// Path every resource is mounted under, e.g. `/api/v1`.
    #[must_use]
    pub fn base_path(&self) -> String {
        format!(
            "/{}/{}",
            self.api_prefix.trim_matches('/'),
            self.api_name.trim_matches('/')
        )
    }
}

fn parse_positive(s: &str) -> Option<usize> {
    s.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

/// Configuration of one REST resource backed by a table.
///
/// ```
/// use std::sync::Arc;
/// use dynarest_core::config::ResourceConfig;
/// use dynarest_model::{KeySchemaElement, TableDefinition, AttributeDefinition, ScalarType};
/// use dynarest_storage::MemoryTable;
///
/// let table = MemoryTable::new(TableDefinition {
///     table_name: "users".to_owned(),
///     key_schema: vec![KeySchemaElement::hash("name")],
///     attribute_definitions: vec![AttributeDefinition::new("name", ScalarType::String)],
///     local_secondary_indexes: vec![],
/// })
/// .unwrap();
/// let config = ResourceConfig::builder()
///     .resource_name("users")
///     .table(Arc::new(table))
///     .build();
/// assert_eq!(config.primary_key_delimiter, "/");
/// assert!(config.scan_index_forward);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct ResourceConfig {
    /// Name of the resource in URLs.
    #[builder(setter(into))]
    pub resource_name: String,

    /// Table the resource reads and writes.
    pub table: Arc<dyn Table>,

    /// Declared fields. Empty means every stored attribute is exposed.
    #[builder(default)]
    pub fields: Vec<FieldSpec>,

    /// To-one links to other resources.
    #[builder(default)]
    pub related: Vec<RelatedField>,

    /// Read with strong consistency.
    #[builder(default = false)]
    pub consistent_read: bool,

    /// Default ordering of range keys; `reverse` flips it.
    #[builder(default = true)]
    pub scan_index_forward: bool,

    /// Separator between hash and range key in detail URLs.
    #[builder(default = String::from("/"), setter(into))]
    pub primary_key_delimiter: String,

    /// Expose the primary key attributes as fields.
    #[builder(default = false)]
    pub build_primary_keys: bool,

    /// Answer writes with the stored object instead of an empty body.
    #[builder(default = false)]
    pub always_return_data: bool,

    /// Key of the object array in list responses.
    #[builder(default = String::from("objects"), setter(into))]
    pub collection_name: String,

    /// Page size used when a request has no `limit`.
    #[builder(default = DEFAULT_LIMIT)]
    pub default_limit: usize,

    /// Cap on the requested page size.
    #[builder(default = MAX_LIMIT)]
    pub max_limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = AdapterConfig::default();
        assert_eq!(config.listen, "0.0.0.0:8000");
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.api_name, "v1");
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.max_limit, 1000);
        assert_eq!(config.log_level, "info");
        assert!(config.definitions_path.is_none());
    }

    #[test]
    fn test_should_build_with_typed_builder() {
        let config = AdapterConfig::builder()
            .listen("127.0.0.1:9000".to_owned())
            .api_name("v2".to_owned())
            .max_limit(50)
            .build();
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.base_path(), "/api/v2");
        assert_eq!(config.max_limit, 50);
        assert_eq!(config.default_limit, 20);
    }

    #[test]
    fn test_should_normalize_base_path_slashes() {
        let config = AdapterConfig::builder()
            .api_prefix("/rest/".to_owned())
            .api_name("/v3/".to_owned())
            .build();
        assert_eq!(config.base_path(), "/rest/v3");
    }

    #[test]
    fn test_should_reject_non_positive_limits() {
        assert_eq!(parse_positive("25"), Some(25));
        assert_eq!(parse_positive("0"), None);
        assert_eq!(parse_positive("lots"), None);
    }
}
