//! Key schema resolution.
//!
//! Reads a table's definition once and produces the [`TableKeySchema`] the
//! filter builder and planner work against.

use std::collections::BTreeMap;

use dynarest_model::{
    AttributeValue, IndexProjection, KeyAttribute, KeyType, ProjectionType, ScalarType,
    SecondaryIndex, TableDefinition, TableKeySchema,
};

use crate::error::AdapterError;

/// Resolve the key schema of a table.
///
/// Fails with [`AdapterError::Schema`] when the hash key is missing, a key
/// attribute has no declared type, an index lacks a range element or two
/// indexes share a name.
pub fn resolve_key_schema(definition: &TableDefinition) -> Result<TableKeySchema, AdapterError> {
    let table = &definition.table_name;
    let typed = |name: &str| -> Result<KeyAttribute, AdapterError> {
        definition
            .attribute_type(name)
            .map(|t| KeyAttribute::new(name, t))
            .ok_or_else(|| {
                AdapterError::Schema(format!(
                    "table '{table}' declares no type for key attribute '{name}'"
                ))
            })
    };

    let hash_name = definition.key_attribute(KeyType::Hash).ok_or_else(|| {
        AdapterError::Schema(format!("table '{table}' declares no HASH key"))
    })?;
    let hash_key = typed(hash_name)?;
    let range_key = definition
        .key_attribute(KeyType::Range)
        .map(typed)
        .transpose()?;

    let mut indexes = BTreeMap::new();
    for lsi in &definition.local_secondary_indexes {
        let attr = lsi
            .key_schema
            .iter()
            .find(|e| e.key_type == KeyType::Range)
            .ok_or_else(|| {
                AdapterError::Schema(format!(
                    "index '{}' of table '{table}' has no RANGE element",
                    lsi.index_name
                ))
            })?;
        let projection = match lsi.projection.projection_type {
            ProjectionType::All => IndexProjection::Full,
            ProjectionType::KeysOnly => IndexProjection::KeysOnly,
        };
        let index = SecondaryIndex {
            name: lsi.index_name.clone(),
            indexed_attribute: typed(&attr.attribute_name)?,
            projection,
        };
        if indexes.insert(lsi.index_name.clone(), index).is_some() {
            return Err(AdapterError::Schema(format!(
                "table '{table}' declares index '{}' twice",
                lsi.index_name
            )));
        }
    }

    Ok(TableKeySchema {
        hash_key,
        range_key,
        indexes,
    })
}

/// Coerce the text form of a key value to the key's declared type.
///
/// Numeric keys accept decimal numbers only.
pub fn coerce_key_text(key: &KeyAttribute, text: &str) -> Result<AttributeValue, AdapterError> {
    match key.scalar_type {
        ScalarType::String => Ok(AttributeValue::S(text.to_owned())),
        ScalarType::Numeric => AttributeValue::parse_number(text).ok_or_else(|| {
            AdapterError::validation(format!(
                "'{text}' is not a valid number for key '{}'",
                key.name
            ))
        }),
    }
}
