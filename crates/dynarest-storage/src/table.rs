//! The storage engine interface consumed by the adapter.

use std::fmt::Debug;

use dynarest_model::{AttributeValue, Item, TableDefinition};

use crate::condition::Condition;
use crate::error::StorageError;
use crate::key::PrimaryKey;

/// A query restricted to one hash key partition.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// Hash key value selecting the partition.
    pub hash_key: AttributeValue,
    /// Condition on the range key, or on the indexed attribute when `index`
    /// is set.
    pub range_condition: Option<Condition>,
    /// Local secondary index to read through.
    pub index: Option<String>,
    /// Maximum number of items to return.
    pub limit: Option<usize>,
    /// Resume after this key.
    pub exclusive_start_key: Option<PrimaryKey>,
    /// Indexed attribute value at the start key, for index queries.
    ///
    /// When absent it is read from the stored item, which must then exist.
    pub exclusive_start_index_value: Option<AttributeValue>,
    /// Ascending order when `true`.
    pub scan_forward: bool,
    /// Request a strongly consistent read.
    pub consistent_read: bool,
}

impl QueryRequest {
    /// An unbounded forward query over one partition.
    #[must_use]
    pub fn partition(hash_key: AttributeValue) -> Self {
        Self {
            hash_key,
            range_condition: None,
            index: None,
            limit: None,
            exclusive_start_key: None,
            exclusive_start_index_value: None,
            scan_forward: true,
            consistent_read: false,
        }
    }
}

/// A full-table read with per-attribute filters.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    /// Filters that must all hold, by attribute name.
    pub filters: Vec<(String, Condition)>,
    /// Maximum number of matching items to return.
    pub limit: Option<usize>,
    /// Resume after this key.
    pub exclusive_start_key: Option<PrimaryKey>,
    /// Only return these attributes.
    pub attributes_to_get: Option<Vec<String>>,
}

/// One page of a query or scan.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Items in store order.
    pub items: Vec<Item>,
    /// Continuation key, present when more items remain.
    pub last_evaluated_key: Option<PrimaryKey>,
    /// Indexed attribute value of the last item, for index queries that
    /// have more items.
    pub last_evaluated_index_value: Option<AttributeValue>,
}

/// A hash/range keyed table.
///
/// Implementations must be safe to share across concurrently handled
/// requests.
pub trait Table: Send + Sync + Debug {
    /// The table's definition.
    fn describe(&self) -> &TableDefinition;

    /// Fetch one item by primary key.
    fn get_item(&self, key: &PrimaryKey, consistent_read: bool)
    -> Result<Option<Item>, StorageError>;

    /// Store an item.
    ///
    /// With `overwrite` the item replaces any stored item with the same key.
    /// Without it the attributes are merged into the stored item, which must
    /// exist.
    fn put_item(&self, item: Item, overwrite: bool) -> Result<(), StorageError>;

    /// Delete one item, returning it if it existed.
    fn delete_item(&self, key: &PrimaryKey) -> Result<Option<Item>, StorageError>;

    /// Query one partition.
    fn query(&self, request: &QueryRequest) -> Result<Page, StorageError>;

    /// Scan the whole table.
    fn scan(&self, request: &ScanRequest) -> Result<Page, StorageError>;

    /// Fetch many items by key. Missing keys are skipped; order follows `keys`.
    fn batch_get(&self, keys: &[PrimaryKey]) -> Result<Vec<Item>, StorageError>;
}
