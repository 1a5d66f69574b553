//! Storage engine errors.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A required key attribute was not found in the item.
    #[error("missing required key attribute: {attr}")]
    MissingKeyAttribute {
        /// The name of the missing attribute.
        attr: String,
    },
    /// A key attribute has the wrong type.
    #[error("key attribute '{attr}' has wrong type: expected {expected}, got {actual}")]
    InvalidKeyType {
        /// The name of the attribute.
        attr: String,
        /// The expected type descriptor.
        expected: String,
        /// The actual type descriptor.
        actual: String,
    },
    /// The table definition cannot be served by the engine.
    #[error("invalid table definition for '{table}': {reason}")]
    InvalidDefinition {
        /// The table name.
        table: String,
        /// What is wrong with it.
        reason: String,
    },
    /// No table with this name exists.
    #[error("table not found: {table}")]
    TableNotFound {
        /// The table name.
        table: String,
    },
    /// A table with this name already exists.
    #[error("table already exists: {table}")]
    TableExists {
        /// The table name.
        table: String,
    },
    /// The table has no index with this name.
    #[error("index '{index}' not found on table '{table}'")]
    IndexNotFound {
        /// The table name.
        table: String,
        /// The index name.
        index: String,
    },
    /// A merge update targeted an item that does not exist.
    #[error("item not found")]
    ItemNotFound,
    /// An index query resumed from a key that no longer identifies an item.
    #[error("exclusive start key does not identify an item in index '{index}'")]
    InvalidStartKey {
        /// The index name.
        index: String,
    },
}
