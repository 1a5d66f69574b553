//! Table and resource definitions loaded at startup.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use dynarest_core::config::{AdapterConfig, ResourceConfig};
use dynarest_core::fields::{FieldSpec, RelatedField};
use dynarest_core::registry::ResourceRegistry;
use dynarest_model::TableDefinition;
use dynarest_storage::{MemoryStore, Table};

/// The definitions document.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Definitions {
    /// Tables to create in the store.
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
    /// Resources to serve, in registration order.
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
}

/// One resource over one table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDefinition {
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub related: Vec<RelatedField>,
    #[serde(default)]
    pub consistent_read: bool,
    #[serde(default = "default_true")]
    pub scan_index_forward: bool,
    #[serde(default)]
    pub primary_key_delimiter: Option<String>,
    #[serde(default)]
    pub build_primary_keys: bool,
    #[serde(default)]
    pub always_return_data: bool,
    #[serde(default)]
    pub collection_name: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Definitions {
    /// Read a definitions file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read definitions file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid definitions file {}", path.display()))
    }

    /// Create the tables in `store` and register the resources.
    ///
    /// Resources are registered in document order, so a resource must come
    /// after the resources its related fields point at.
    pub fn apply(
        self,
        store: &MemoryStore,
        config: &AdapterConfig,
    ) -> Result<ResourceRegistry> {
        for table in self.tables {
            let name = table.table_name.clone();
            store
                .create_table(table)
                .with_context(|| format!("cannot create table '{name}'"))?;
        }

        let registry = ResourceRegistry::new(config.base_path());
        for resource in self.resources {
            let name = resource.name.clone();
            let table: Arc<dyn Table> = store
                .require_table(&resource.table)
                .with_context(|| format!("resource '{name}' uses an unknown table"))?;
            registry
                .register(resource.into_config(table, config))
                .with_context(|| format!("cannot register resource '{name}'"))?;
        }
        info!(resources = ?registry.names(), "definitions loaded");
        Ok(registry)
    }
}

impl ResourceDefinition {
    fn into_config(self, table: Arc<dyn Table>, config: &AdapterConfig) -> ResourceConfig {
        ResourceConfig::builder()
            .resource_name(self.name)
            .table(table)
            .fields(self.fields)
            .related(self.related)
            .consistent_read(self.consistent_read)
            .scan_index_forward(self.scan_index_forward)
            .primary_key_delimiter(self.primary_key_delimiter.unwrap_or_else(|| "/".to_owned()))
            .build_primary_keys(self.build_primary_keys)
            .always_return_data(self.always_return_data)
            .collection_name(self.collection_name.unwrap_or_else(|| "objects".to_owned()))
            .default_limit(config.default_limit)
            .max_limit(config.max_limit)
            .build()
    }
}
