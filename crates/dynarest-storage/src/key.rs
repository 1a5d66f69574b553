//! Primary keys and key ordering.

use std::cmp::Ordering;

use dynarest_model::{AttributeValue, Item, KeyAttribute, ScalarType};

use crate::error::StorageError;

/// A primary key consisting of a hash key and an optional range key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimaryKey {
    /// The hash (partition) key value.
    pub hash_key: AttributeValue,
    /// The optional range (sort) key value.
    pub range_key: Option<AttributeValue>,
}

impl PrimaryKey {
    /// Key of a hash-only table.
    #[must_use]
    pub fn hash(hash_key: AttributeValue) -> Self {
        Self {
            hash_key,
            range_key: None,
        }
    }

    /// Key of a hash/range table.
    #[must_use]
    pub fn hash_range(hash_key: AttributeValue, range_key: AttributeValue) -> Self {
        Self {
            hash_key,
            range_key: Some(range_key),
        }
    }
}

// ---------------------------------------------------------------------------
// KeySchema
// ---------------------------------------------------------------------------

/// Hash key and optional range key definition of a table, as the engine
/// enforces them on writes.
#[derive(Debug, Clone)]
pub struct KeySchema {
    /// Hash key name and type.
    pub hash_key: KeyAttribute,
    /// Optional range key name and type.
    pub range_key: Option<KeyAttribute>,
}

impl KeySchema {
    /// Extracts the primary key from an item.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::MissingKeyAttribute` if a required key attribute
    /// is missing, or `StorageError::InvalidKeyType` if a key attribute has
    /// the wrong type.
    pub fn extract(&self, item: &Item) -> Result<PrimaryKey, StorageError> {
        let hash_value = required_key(&self.hash_key, item)?;
        let range_value = match &self.range_key {
            Some(def) => Some(required_key(def, item)?),
            None => None,
        };
        Ok(PrimaryKey {
            hash_key: hash_value.clone(),
            range_key: range_value.cloned(),
        })
    }

    /// Checks that a lookup key matches this schema.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` when the range component is missing or
    /// superfluous, or a value has the wrong type.
    pub fn validate(&self, key: &PrimaryKey) -> Result<(), StorageError> {
        validate_key_type(&self.hash_key, &key.hash_key)?;
        match (&self.range_key, &key.range_key) {
            (Some(def), Some(value)) => validate_key_type(def, value),
            (Some(def), None) => Err(StorageError::MissingKeyAttribute {
                attr: def.name.clone(),
            }),
            (None, Some(value)) => Err(StorageError::InvalidKeyType {
                attr: "range key".to_owned(),
                expected: "none".to_owned(),
                actual: value.type_descriptor().to_owned(),
            }),
            (None, None) => Ok(()),
        }
    }

    /// Builds an item holding only the key attributes.
    #[must_use]
    pub fn key_item(&self, key: &PrimaryKey) -> Item {
        let mut item = Item::new();
        item.insert(self.hash_key.name.clone(), key.hash_key.clone());
        if let (Some(def), Some(value)) = (&self.range_key, &key.range_key) {
            item.insert(def.name.clone(), value.clone());
        }
        item
    }
}

fn required_key<'a>(
    def: &KeyAttribute,
    item: &'a Item,
) -> Result<&'a AttributeValue, StorageError> {
    let value = item
        .get(&def.name)
        .filter(|v| !v.is_null())
        .ok_or_else(|| StorageError::MissingKeyAttribute {
            attr: def.name.clone(),
        })?;
    validate_key_type(def, value)?;
    Ok(value)
}

/// Validates that an attribute value matches the expected scalar type.
pub(crate) fn validate_key_type(
    def: &KeyAttribute,
    value: &AttributeValue,
) -> Result<(), StorageError> {
    if matches!(
        (def.scalar_type, value),
        (ScalarType::String, AttributeValue::S(_)) | (ScalarType::Numeric, AttributeValue::N(_))
    ) {
        Ok(())
    } else {
        Err(StorageError::InvalidKeyType {
            attr: def.name.clone(),
            expected: def.scalar_type.as_str().to_owned(),
            actual: value.type_descriptor().to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// SortableAttributeValue
// ---------------------------------------------------------------------------

/// A wrapper around key-eligible [`AttributeValue`] variants that implements
/// [`Ord`] for use as `BTreeMap` keys.
///
/// - **Strings (S)**: UTF-8 byte ordering.
/// - **Numbers (N)**: exact decimal ordering of the stored text.
/// - **Sentinel**: used as the single per-partition key of hash-only tables.
#[derive(Debug, Clone)]
pub enum SortableAttributeValue {
    /// String key.
    S(String),
    /// Number key (stored as the original string representation).
    N(String),
    /// Sentinel value for tables without a range key.
    Sentinel,
}

impl SortableAttributeValue {
    /// Converts this sortable value back into an [`AttributeValue`].
    ///
    /// Returns `None` for the `Sentinel` variant.
    #[must_use]
    pub fn to_attribute_value(&self) -> Option<AttributeValue> {
        match self {
            Self::S(s) => Some(AttributeValue::S(s.clone())),
            Self::N(n) => Some(AttributeValue::N(n.clone())),
            Self::Sentinel => None,
        }
    }

    /// Creates a sortable value from a scalar, `None` for nulls.
    #[must_use]
    pub fn from_attribute_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::S(s) => Some(Self::S(s.clone())),
            AttributeValue::N(n) => Some(Self::N(n.clone())),
            AttributeValue::Null => None,
        }
    }

    /// Sortable form of an optional range key.
    #[must_use]
    pub fn from_range_key(value: Option<&AttributeValue>) -> Self {
        value
            .and_then(Self::from_attribute_value)
            .unwrap_or(Self::Sentinel)
    }
}

/// A number text split into sign, significant digits and decimal exponent,
/// so that `value = 0.DIGITS * 10^exponent`.
///
/// Digits carry no leading or trailing zeros; zero has no digits.
#[derive(Debug)]
struct DecimalParts {
    negative: bool,
    digits: String,
    exponent: i64,
}

impl DecimalParts {
    fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let (negative, unsigned) = match trimmed.as_bytes().first()? {
            b'-' => (true, &trimmed[1..]),
            b'+' => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (mantissa, exp) = match unsigned.split_once(['e', 'E']) {
            Some((m, e)) => (m, e.parse::<i64>().ok()?),
            None => (unsigned, 0),
        };
        let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int.is_empty() && frac.is_empty() {
            return None;
        }
        if !int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }

        let all = format!("{int}{frac}");
        let leading = all.bytes().take_while(|b| *b == b'0').count();
        let digits = all[leading..].trim_end_matches('0').to_owned();
        let int_len = i64::try_from(int.len()).ok()?;
        let leading = i64::try_from(leading).ok()?;
        let exponent = if digits.is_empty() {
            0
        } else {
            int_len.checked_sub(leading)?.checked_add(exp)?
        };
        Some(Self {
            negative: negative && !digits.is_empty(),
            digits,
            exponent,
        })
    }

    fn signum(&self) -> i8 {
        match (self.digits.is_empty(), self.negative) {
            (true, _) => 0,
            (false, true) => -1,
            (false, false) => 1,
        }
    }

    fn magnitude_cmp(&self, other: &Self) -> Ordering {
        self.exponent
            .cmp(&other.exponent)
            .then_with(|| self.digits.as_bytes().cmp(other.digits.as_bytes()))
    }
}

impl PartialEq for DecimalParts {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DecimalParts {}

impl Ord for DecimalParts {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.signum().cmp(&other.signum()) {
            Ordering::Equal => match self.signum() {
                0 => Ordering::Equal,
                1 => self.magnitude_cmp(other),
                _ => other.magnitude_cmp(self),
            },
            order => order,
        }
    }
}

impl PartialOrd for DecimalParts {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compares two number texts by value without going through a float.
///
/// Unparseable texts sort after every number, by their raw bytes.
fn compare_numbers(a: &str, b: &str) -> Ordering {
    match (DecimalParts::parse(a), DecimalParts::parse(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.as_bytes().cmp(b.as_bytes()),
    }
}

impl PartialEq for SortableAttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortableAttributeValue {}

impl PartialOrd for SortableAttributeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortableAttributeValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::S(a), Self::S(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::N(a), Self::N(b)) => compare_numbers(a, b),
            (Self::Sentinel, Self::Sentinel) => Ordering::Equal,
            // Mixed variants never share a partition; keep the order total anyway.
            (Self::S(_), _) => Ordering::Less,
            (_, Self::S(_)) => Ordering::Greater,
            (Self::N(_), _) => Ordering::Less,
            (_, Self::N(_)) => Ordering::Greater,
        }
    }
}
