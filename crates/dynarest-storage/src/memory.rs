//! In-memory table engine.
//!
//! Provides B-Tree ordered storage with concurrent partition-level access via
//! [`DashMap`]. Each hash key maps to a [`BTreeMap`] of range keys to items,
//! enabling ordered range queries within a partition.
//!
//! # Architecture
//!
//! ```text
//! DashMap<HashKey, BTreeMap<SortableAttributeValue, StoredItem>>
//! ```
//!
//! - Partition-level concurrency: different partitions can be read and written
//!   concurrently without contention.
//! - Range key ordering: within each partition, items are kept in a `BTreeMap`
//!   keyed by [`SortableAttributeValue`].
//! - For tables without a range key, a sentinel value is used as the single
//!   `BTreeMap` key per partition.
//! - Local secondary indexes are evaluated per partition by ordering its items
//!   on `(indexed attribute, range key)`. Items without the indexed attribute
//!   are absent from the index.

use std::collections::BTreeMap;
use std::ops::Bound;

use dashmap::DashMap;
use tracing::debug;

use dynarest_model::types::{KeyType, ProjectionType};
use dynarest_model::{AttributeValue, Item, KeyAttribute, TableDefinition};

use crate::condition::Condition;
use crate::error::StorageError;
use crate::key::{KeySchema, PrimaryKey, SortableAttributeValue, validate_key_type};
use crate::table::{Page, QueryRequest, ScanRequest, Table};

/// An item stored in the table, containing all attributes.
#[derive(Debug, Clone)]
struct StoredItem {
    attributes: Item,
}

/// Layout of one local secondary index.
#[derive(Debug, Clone)]
struct IndexLayout {
    name: String,
    attribute: KeyAttribute,
    keys_only: bool,
}

type Partition = BTreeMap<SortableAttributeValue, StoredItem>;

// ---------------------------------------------------------------------------
// MemoryTable
// ---------------------------------------------------------------------------

/// In-memory storage for a single table.
#[derive(Debug)]
pub struct MemoryTable {
    definition: TableDefinition,
    key_schema: KeySchema,
    indexes: Vec<IndexLayout>,
    data: DashMap<AttributeValue, Partition>,
}

impl MemoryTable {
    /// Creates an empty table from its definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidDefinition` when the definition has no
    /// hash key, a key attribute lacks a type definition, or an index is
    /// malformed.
    pub fn new(definition: TableDefinition) -> Result<Self, StorageError> {
        let invalid = |reason: String| StorageError::InvalidDefinition {
            table: definition.table_name.clone(),
            reason,
        };
        let typed = |name: &str| {
            definition
                .attribute_type(name)
                .map(|t| KeyAttribute::new(name, t))
                .ok_or_else(|| invalid(format!("attribute '{name}' has no type definition")))
        };

        let hash_name = definition
            .key_attribute(KeyType::Hash)
            .ok_or_else(|| invalid("no HASH key declared".to_owned()))?;
        let hash_key = typed(hash_name)?;
        let range_key = definition
            .key_attribute(KeyType::Range)
            .map(typed)
            .transpose()?;

        let mut indexes = Vec::with_capacity(definition.local_secondary_indexes.len());
        for lsi in &definition.local_secondary_indexes {
            if range_key.is_none() {
                return Err(invalid(format!(
                    "index '{}' requires a table with a RANGE key",
                    lsi.index_name
                )));
            }
            let attr_name = lsi
                .key_schema
                .iter()
                .find(|e| e.key_type == KeyType::Range)
                .map(|e| e.attribute_name.as_str())
                .ok_or_else(|| invalid(format!("index '{}' has no RANGE key", lsi.index_name)))?;
            indexes.push(IndexLayout {
                name: lsi.index_name.clone(),
                attribute: typed(attr_name)?,
                keys_only: lsi.projection.projection_type == ProjectionType::KeysOnly,
            });
        }

        Ok(Self {
            key_schema: KeySchema {
                hash_key,
                range_key,
            },
            indexes,
            data: DashMap::new(),
            definition,
        })
    }

    /// Returns the number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.iter().map(|p| p.value().len()).sum()
    }

    /// Returns `true` when no items are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index_layout(&self, name: &str) -> Result<&IndexLayout, StorageError> {
        self.indexes
            .iter()
            .find(|idx| idx.name == name)
            .ok_or_else(|| StorageError::IndexNotFound {
                table: self.definition.table_name.clone(),
                index: name.to_owned(),
            })
    }

    fn validate_index_attributes(&self, item: &Item) -> Result<(), StorageError> {
        for layout in &self.indexes {
            if let Some(value) = item.get(&layout.attribute.name).filter(|v| !v.is_null()) {
                validate_key_type(&layout.attribute, value)?;
            }
        }
        Ok(())
    }

    fn query_index(
        &self,
        partition: &Partition,
        layout: &IndexLayout,
        request: &QueryRequest,
        limit: usize,
    ) -> Result<Vec<Item>, StorageError> {
        let start = match &request.exclusive_start_key {
            Some(esk) => {
                let range = SortableAttributeValue::from_range_key(esk.range_key.as_ref());
                let indexed = match &request.exclusive_start_index_value {
                    Some(value) => {
                        validate_key_type(&layout.attribute, value)?;
                        SortableAttributeValue::from_attribute_value(value)
                    }
                    None => partition
                        .get(&range)
                        .and_then(|stored| stored.attributes.get(&layout.attribute.name))
                        .and_then(SortableAttributeValue::from_attribute_value),
                }
                .ok_or_else(|| StorageError::InvalidStartKey {
                    index: layout.name.clone(),
                })?;
                Some((indexed, range))
            }
            None => None,
        };

        let items = collect_index(
            partition,
            layout,
            request.range_condition.as_ref(),
            request.scan_forward,
            limit,
            start.as_ref(),
        );

        Ok(items
            .into_iter()
            .map(|stored| {
                if layout.keys_only {
                    self.project_keys(&stored.attributes, &layout.attribute.name)
                } else {
                    stored.attributes.clone()
                }
            })
            .collect())
    }

    /// Copies the table keys and the indexed attribute out of an item.
    fn project_keys(&self, attributes: &Item, indexed: &str) -> Item {
        let mut names = vec![self.key_schema.hash_key.name.as_str()];
        if let Some(range) = &self.key_schema.range_key {
            names.push(range.name.as_str());
        }
        names.push(indexed);
        project(attributes, &names)
    }

    fn last_key(&self, items: &[Item], has_more: bool) -> Option<PrimaryKey> {
        if !has_more {
            return None;
        }
        items
            .last()
            .and_then(|item| self.key_schema.extract(item).ok())
    }
}

impl Table for MemoryTable {
    fn describe(&self) -> &TableDefinition {
        &self.definition
    }

    fn get_item(
        &self,
        key: &PrimaryKey,
        consistent_read: bool,
    ) -> Result<Option<Item>, StorageError> {
        self.key_schema.validate(key)?;
        debug!(table = %self.definition.table_name, consistent_read, "get item");
        let range = SortableAttributeValue::from_range_key(key.range_key.as_ref());
        Ok(self
            .data
            .get(&key.hash_key)
            .and_then(|partition| partition.get(&range).map(|item| item.attributes.clone())))
    }

    fn put_item(&self, item: Item, overwrite: bool) -> Result<(), StorageError> {
        let key = self.key_schema.extract(&item)?;
        self.validate_index_attributes(&item)?;
        let range = SortableAttributeValue::from_range_key(key.range_key.as_ref());

        if overwrite {
            let replaced = {
                let mut partition = self.data.entry(key.hash_key).or_default();
                partition.insert(range, StoredItem { attributes: item })
            };
            debug!(
                table = %self.definition.table_name,
                replaced = replaced.is_some(),
                "put item"
            );
            return Ok(());
        }

        let mut partition = self
            .data
            .get_mut(&key.hash_key)
            .ok_or(StorageError::ItemNotFound)?;
        let stored = partition
            .get_mut(&range)
            .ok_or(StorageError::ItemNotFound)?;
        stored.attributes.extend(item);
        debug!(table = %self.definition.table_name, "merged item");
        Ok(())
    }

    fn delete_item(&self, key: &PrimaryKey) -> Result<Option<Item>, StorageError> {
        self.key_schema.validate(key)?;
        let range = SortableAttributeValue::from_range_key(key.range_key.as_ref());
        let removed = self
            .data
            .get_mut(&key.hash_key)
            .and_then(|mut partition| partition.remove(&range));
        debug!(
            table = %self.definition.table_name,
            found = removed.is_some(),
            "deleted item"
        );
        Ok(removed.map(|stored| stored.attributes))
    }

    fn query(&self, request: &QueryRequest) -> Result<Page, StorageError> {
        validate_key_type(&self.key_schema.hash_key, &request.hash_key)?;
        let layout = request
            .index
            .as_deref()
            .map(|name| self.index_layout(name))
            .transpose()?;

        let Some(partition) = self.data.get(&request.hash_key) else {
            return Ok(Page::default());
        };

        // One extra item tells whether another page exists.
        let limit = request.limit.unwrap_or(usize::MAX);
        let fetch = limit.saturating_add(1);

        let mut items = match layout {
            Some(layout) => self.query_index(&partition, layout, request, fetch)?,
            None => {
                let start = request
                    .exclusive_start_key
                    .as_ref()
                    .map(|esk| SortableAttributeValue::from_range_key(esk.range_key.as_ref()));
                collect_matching_items(
                    &partition,
                    request.range_condition.as_ref(),
                    request.scan_forward,
                    fetch,
                    start.as_ref(),
                )
                .into_iter()
                .map(|stored| stored.attributes.clone())
                .collect()
            }
        };

        let has_more = items.len() > limit;
        items.truncate(limit);
        let last_evaluated_key = self.last_key(&items, has_more);
        let last_evaluated_index_value = layout
            .filter(|_| last_evaluated_key.is_some())
            .and_then(|layout| items.last()?.get(&layout.attribute.name).cloned());
        debug!(
            table = %self.definition.table_name,
            index = ?request.index,
            count = items.len(),
            has_more,
            "query"
        );
        Ok(Page {
            items,
            last_evaluated_key,
            last_evaluated_index_value,
        })
    }

    fn scan(&self, request: &ScanRequest) -> Result<Page, StorageError> {
        let start = request.exclusive_start_key.as_ref().map(|esk| {
            (
                SortableAttributeValue::from_range_key(Some(&esk.hash_key)),
                SortableAttributeValue::from_range_key(esk.range_key.as_ref()),
            )
        });

        // Hold all partition refs alive while iterating, ordered by hash key.
        let mut partitions: Vec<_> = self.data.iter().collect();
        partitions.sort_by_cached_key(|entry| {
            SortableAttributeValue::from_range_key(Some(entry.key()))
        });

        let limit = request.limit.unwrap_or(usize::MAX);
        let mut items = Vec::new();
        'partitions: for entry in &partitions {
            let hash_sort = SortableAttributeValue::from_range_key(Some(entry.key()));
            for (range_sort, stored) in entry.value() {
                if let Some((start_hash, start_range)) = &start {
                    if (&hash_sort, range_sort) <= (start_hash, start_range) {
                        continue;
                    }
                }
                let matched = request
                    .filters
                    .iter()
                    .all(|(attr, cond)| cond.matches(stored.attributes.get(attr)));
                if !matched {
                    continue;
                }
                if items.len() > limit {
                    break 'partitions;
                }
                items.push(&stored.attributes);
            }
        }

        let has_more = items.len() > limit;
        items.truncate(limit);
        let last_evaluated_key = if has_more {
            items.last().and_then(|item| self.key_schema.extract(item).ok())
        } else {
            None
        };
        let items: Vec<Item> = items
            .into_iter()
            .map(|attributes| match &request.attributes_to_get {
                Some(names) => {
                    let names: Vec<&str> = names.iter().map(String::as_str).collect();
                    project(attributes, &names)
                }
                None => attributes.clone(),
            })
            .collect();

        debug!(
            table = %self.definition.table_name,
            filters = request.filters.len(),
            count = items.len(),
            has_more,
            "scan"
        );
        Ok(Page {
            items,
            last_evaluated_key,
            last_evaluated_index_value: None,
        })
    }

    fn batch_get(&self, keys: &[PrimaryKey]) -> Result<Vec<Item>, StorageError> {
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(item) = self.get_item(key, true)? {
                items.push(item);
            }
        }
        debug!(
            table = %self.definition.table_name,
            requested = keys.len(),
            found = items.len(),
            "batch get"
        );
        Ok(items)
    }
}

fn project(attributes: &Item, names: &[&str]) -> Item {
    names
        .iter()
        .filter_map(|name| {
            attributes
                .get(*name)
                .map(|value| ((*name).to_owned(), value.clone()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Query helpers
// ---------------------------------------------------------------------------

/// Collects items from a partition that match the range condition.
fn collect_matching_items<'a>(
    partition: &'a Partition,
    range_condition: Option<&Condition>,
    scan_forward: bool,
    limit: usize,
    exclusive_start_key: Option<&SortableAttributeValue>,
) -> Vec<&'a StoredItem> {
    match range_condition {
        None => collect_range(
            partition,
            Bound::Unbounded,
            Bound::Unbounded,
            scan_forward,
            limit,
            exclusive_start_key,
        ),
        Some(Condition::BeginsWith(prefix)) => {
            collect_begins_with(partition, prefix, scan_forward, limit, exclusive_start_key)
        }
        Some(condition) => match condition.bounds() {
            Some((lower, upper)) => collect_range(
                partition,
                lower,
                upper,
                scan_forward,
                limit,
                exclusive_start_key,
            ),
            None => Vec::new(),
        },
    }
}

/// Collects items within a BTreeMap range, respecting direction and pagination.
fn collect_range<'a>(
    partition: &'a Partition,
    lower: Bound<SortableAttributeValue>,
    upper: Bound<SortableAttributeValue>,
    scan_forward: bool,
    limit: usize,
    exclusive_start_key: Option<&SortableAttributeValue>,
) -> Vec<&'a StoredItem> {
    let Some(range) = effective_range(lower, upper, scan_forward, exclusive_start_key) else {
        return Vec::new();
    };
    if scan_forward {
        partition
            .range(range)
            .take(limit)
            .map(|(_, item)| item)
            .collect()
    } else {
        partition
            .range(range)
            .rev()
            .take(limit)
            .map(|(_, item)| item)
            .collect()
    }
}

/// Collects items whose string range key begins with the given prefix.
fn collect_begins_with<'a>(
    partition: &'a Partition,
    prefix: &str,
    scan_forward: bool,
    limit: usize,
    exclusive_start_key: Option<&SortableAttributeValue>,
) -> Vec<&'a StoredItem> {
    let lower = Bound::Included(SortableAttributeValue::S(prefix.to_owned()));
    let upper = compute_prefix_upper_bound(prefix).map_or(Bound::Unbounded, Bound::Excluded);
    let Some(range) = effective_range(lower, upper, scan_forward, exclusive_start_key) else {
        return Vec::new();
    };
    let has_prefix =
        |k: &SortableAttributeValue| matches!(k, SortableAttributeValue::S(s) if s.starts_with(prefix));

    if scan_forward {
        partition
            .range(range)
            .filter(|(k, _)| has_prefix(k))
            .take(limit)
            .map(|(_, item)| item)
            .collect()
    } else {
        partition
            .range(range)
            .rev()
            .filter(|(k, _)| has_prefix(k))
            .take(limit)
            .map(|(_, item)| item)
            .collect()
    }
}

type KeyRange = (Bound<SortableAttributeValue>, Bound<SortableAttributeValue>);

/// Narrows a key range by the exclusive start key on the side the read
/// resumes from. Returns `None` when the range is empty, since
/// `BTreeMap::range` panics on inverted bounds.
fn effective_range(
    lower: Bound<SortableAttributeValue>,
    upper: Bound<SortableAttributeValue>,
    scan_forward: bool,
    exclusive_start_key: Option<&SortableAttributeValue>,
) -> Option<KeyRange> {
    let (lower, upper) = match exclusive_start_key {
        Some(start) if scan_forward => {
            let lower = match &lower {
                Bound::Included(l) | Bound::Excluded(l) if start < l => lower,
                _ => Bound::Excluded(start.clone()),
            };
            (lower, upper)
        }
        Some(start) => {
            let upper = match &upper {
                Bound::Included(u) | Bound::Excluded(u) if start > u => upper,
                _ => Bound::Excluded(start.clone()),
            };
            (lower, upper)
        }
        None => (lower, upper),
    };
    let valid = match (&lower, &upper) {
        (Bound::Included(l), Bound::Included(u)) => l <= u,
        (Bound::Included(l) | Bound::Excluded(l), Bound::Included(u) | Bound::Excluded(u)) => {
            l < u
        }
        _ => true,
    };
    valid.then_some((lower, upper))
}

/// Computes the exclusive upper bound for a prefix scan.
///
/// Increments the last byte of the prefix string. Returns `None` if the
/// prefix is empty or all bytes are `0xFF`.
fn compute_prefix_upper_bound(prefix: &str) -> Option<SortableAttributeValue> {
    let mut bytes = prefix.as_bytes().to_vec();
    while bytes.last() == Some(&0xFF) {
        bytes.pop();
    }
    let last = bytes.last_mut()?;
    *last += 1;
    // Only used as a range bound, so a lossy conversion is acceptable.
    Some(SortableAttributeValue::S(
        String::from_utf8_lossy(&bytes).into_owned(),
    ))
}

/// Collects index entries of a partition ordered by `(indexed attribute,
/// range key)`, resuming strictly after `start`.
fn collect_index<'a>(
    partition: &'a Partition,
    layout: &IndexLayout,
    condition: Option<&Condition>,
    scan_forward: bool,
    limit: usize,
    start: Option<&(SortableAttributeValue, SortableAttributeValue)>,
) -> Vec<&'a StoredItem> {
    let mut entries: Vec<_> = partition
        .iter()
        .filter_map(|(range, stored)| {
            let value = stored.attributes.get(&layout.attribute.name)?;
            let indexed = SortableAttributeValue::from_attribute_value(value)?;
            condition
                .is_none_or(|c| c.matches(Some(value)))
                .then_some(((indexed, range.clone()), stored))
        })
        .collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    if !scan_forward {
        entries.reverse();
    }

    entries
        .into_iter()
        .filter(|(key, _)| match start {
            Some(start) if scan_forward => key > start,
            Some(start) => key < start,
            None => true,
        })
        .take(limit)
        .map(|(_, stored)| stored)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
