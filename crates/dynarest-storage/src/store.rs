//! Table registry of the in-memory engine.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use dynarest_model::TableDefinition;

use crate::error::StorageError;
use crate::memory::MemoryTable;
use crate::table::Table;

/// All tables of the in-memory engine, keyed by name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<String, Arc<MemoryTable>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<Arc<MemoryTable>> {
        self.tables.get(name).map(|r| Arc::clone(r.value()))
    }

    /// Get a table or return `StorageError::TableNotFound`.
    pub fn require_table(&self, name: &str) -> Result<Arc<MemoryTable>, StorageError> {
        self.get_table(name)
            .ok_or_else(|| StorageError::TableNotFound {
                table: name.to_owned(),
            })
    }

    /// Create a table. Returns an error if the table already exists or the
    /// definition is invalid.
    pub fn create_table(
        &self,
        definition: TableDefinition,
    ) -> Result<Arc<MemoryTable>, StorageError> {
        let table = Arc::new(MemoryTable::new(definition)?);
        let name = table.describe().table_name.clone();
        // Use entry API to atomically check + insert.
        match self.tables.entry(name) {
            dashmap::mapref::entry::Entry::Occupied(e) => Err(StorageError::TableExists {
                table: e.key().clone(),
            }),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                info!(table = %e.key(), "created table");
                e.insert(Arc::clone(&table));
                Ok(table)
            }
        }
    }

    /// List all table names (sorted).
    #[must_use]
    pub fn list_table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}
