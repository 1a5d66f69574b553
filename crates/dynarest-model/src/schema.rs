//! Resolved key schema of a table.
//!
//! [`TableKeySchema`] is what the adapter plans against: the hash key, the
//! optional range key, and every secondary index keyed by name together with
//! the attribute it orders by and whether it carries full items or keys only.
//! It is produced once per resource and never mutated afterwards.

use std::collections::BTreeMap;

use crate::types::ScalarType;

/// A key attribute with its name and scalar type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyAttribute {
    /// The attribute name.
    pub name: String,
    /// The scalar type.
    pub scalar_type: ScalarType,
}

impl KeyAttribute {
    /// Build a key attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
        }
    }

    /// Whether the key is numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.scalar_type == ScalarType::Numeric
    }
}

/// What a secondary index stores per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexProjection {
    /// Entries carry every attribute of the item.
    Full,
    /// Entries carry only the table keys and the indexed attribute.
    KeysOnly,
}

/// A secondary index as seen by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryIndex {
    /// Index name.
    pub name: String,
    /// The attribute the index orders each partition by.
    pub indexed_attribute: KeyAttribute,
    /// Projection of the index.
    pub projection: IndexProjection,
}

impl SecondaryIndex {
    /// Whether reads through this index must be hydrated with a batch get.
    #[must_use]
    pub fn needs_hydration(&self) -> bool {
        self.projection == IndexProjection::KeysOnly
    }
}

/// The primary key structure and secondary indexes of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableKeySchema {
    /// Partition key.
    pub hash_key: KeyAttribute,
    /// Optional sort key.
    pub range_key: Option<KeyAttribute>,
    /// Secondary indexes by name.
    pub indexes: BTreeMap<String, SecondaryIndex>,
}

impl TableKeySchema {
    /// Schema for a hash-only table without indexes.
    #[must_use]
    pub fn hash_only(hash_key: KeyAttribute) -> Self {
        Self {
            hash_key,
            range_key: None,
            indexes: BTreeMap::new(),
        }
    }

    /// Name of the range key, if any.
    #[must_use]
    pub fn range_key_name(&self) -> Option<&str> {
        self.range_key.as_ref().map(|k| k.name.as_str())
    }

    /// Whether `attr` is the hash key.
    #[must_use]
    pub fn is_hash_key(&self, attr: &str) -> bool {
        self.hash_key.name == attr
    }

    /// Whether `attr` is the range key.
    #[must_use]
    pub fn is_range_key(&self, attr: &str) -> bool {
        self.range_key_name() == Some(attr)
    }

    /// Whether `attr` is part of the primary key.
    #[must_use]
    pub fn is_primary_key(&self, attr: &str) -> bool {
        self.is_hash_key(attr) || self.is_range_key(attr)
    }

    /// The primary key attribute named `attr`, if it is one.
    #[must_use]
    pub fn primary_key_attribute(&self, attr: &str) -> Option<&KeyAttribute> {
        if self.is_hash_key(attr) {
            Some(&self.hash_key)
        } else {
            self.range_key.as_ref().filter(|k| k.name == attr)
        }
    }

    /// The first index (by name) whose indexed attribute is `attr`.
    #[must_use]
    pub fn index_for_attribute(&self, attr: &str) -> Option<&SecondaryIndex> {
        self.indexes
            .values()
            .find(|idx| idx.indexed_attribute.name == attr)
    }

    /// Look up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&SecondaryIndex> {
        self.indexes.get(name)
    }

    /// Names of the primary key attributes, hash key first.
    #[must_use]
    pub fn key_names(&self) -> Vec<&str> {
        let mut names = vec![self.hash_key.name.as_str()];
        if let Some(range) = self.range_key_name() {
            names.push(range);
        }
        names
    }
}
