//! Filter building.
//!
//! Turns the query parameters of a list request, plus the key segments of a
//! wildcard detail path, into a [`FilterDescriptor`]:
//!
//! ```text
//! userId=alice                 equality
//! ts=17*                       prefix (a bare `*` matches everything)
//! ts__from=100&ts__to=200      inclusive integer range
//! offset_hash / offset_range   exclusive start key
//! offset_index                 indexed value at the start key
//! offset_special=1             resume marker of a hybrid page
//! reverse, limit, format       paging and output options
//! ```
//!
//! Reserved parameter names are matched case-insensitively. Every other
//! parameter is an attribute filter.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use dynarest_model::{AttributeValue, ScalarType, TableKeySchema};
use dynarest_storage::{Condition, PrimaryKey};

use crate::config::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::error::AdapterError;
use crate::fields::parse_bool;
use crate::schema::coerce_key_text;

const FROM_SUFFIX: &str = "__from";
const TO_SUFFIX: &str = "__to";

/// A typed condition on one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Attribute equals the value.
    Equality(AttributeValue),
    /// String attribute starts with the prefix.
    Prefix(String),
    /// Numeric attribute lies in the inclusive range.
    Between {
        /// Lower bound.
        lower: i64,
        /// Upper bound.
        upper: i64,
    },
}

impl Predicate {
    /// The storage condition expressing this predicate.
    #[must_use]
    pub fn to_condition(&self) -> Condition {
        match self {
            Self::Equality(value) => Condition::Eq(value.clone()),
            Self::Prefix(prefix) => Condition::BeginsWith(prefix.clone()),
            Self::Between { lower, upper } => Condition::Between(
                AttributeValue::number(*lower),
                AttributeValue::number(*upper),
            ),
        }
    }
}

/// Everything a list request asks for, in typed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDescriptor {
    /// At most one predicate per attribute.
    pub predicates: BTreeMap<String, Predicate>,
    /// Request text each equality or prefix predicate was parsed from.
    pub raw_values: BTreeMap<String, String>,
    /// Index chosen by an equality or range on its attribute.
    pub selected_index: Option<String>,
    /// Resume point from `offset_hash` / `offset_range`.
    pub exclusive_start_key: Option<PrimaryKey>,
    /// Selected index attribute value at the resume point, from
    /// `offset_index`.
    pub exclusive_start_index_value: Option<AttributeValue>,
    /// The start key belongs to a hybrid page.
    pub offset_special: bool,
    /// Walk the range key backwards.
    pub sort_descending: bool,
    /// Page size.
    pub page_limit: usize,
    /// The request carried a `limit`.
    pub explicit_limit: bool,
    /// The requested output format, as given.
    pub format: Option<String>,
}

impl Default for FilterDescriptor {
    fn default() -> Self {
        Self {
            predicates: BTreeMap::new(),
            raw_values: BTreeMap::new(),
            selected_index: None,
            exclusive_start_key: None,
            exclusive_start_index_value: None,
            offset_special: false,
            sort_descending: false,
            page_limit: DEFAULT_LIMIT,
            explicit_limit: false,
            format: None,
        }
    }
}

impl FilterDescriptor {
    /// The hash key equality, when present.
    #[must_use]
    pub fn hash_equality(&self, schema: &TableKeySchema) -> Option<&AttributeValue> {
        match self.predicates.get(&schema.hash_key.name) {
            Some(Predicate::Equality(value)) => Some(value),
            _ => None,
        }
    }

    /// Every predicate as a storage condition.
    #[must_use]
    pub fn conditions(&self) -> Vec<(String, Condition)> {
        self.predicates
            .iter()
            .map(|(attr, p)| (attr.clone(), p.to_condition()))
            .collect()
    }
}

/// Key segments taken from a detail path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathKeys {
    /// Decoded hash key segment.
    pub hash: Option<String>,
    /// Decoded range key segment.
    pub range: Option<String>,
}

/// Builds [`FilterDescriptor`]s for one resource.
#[derive(Debug, Clone)]
pub struct FilterBuilder<'a> {
    schema: &'a TableKeySchema,
    field_types: Option<&'a HashMap<String, ScalarType>>,
    default_limit: usize,
    max_limit: usize,
}

impl<'a> FilterBuilder<'a> {
    /// A builder using the default page limits.
    #[must_use]
    pub fn new(schema: &'a TableKeySchema) -> Self {
        Self {
            schema,
            field_types: None,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }

    /// Declared scalar types of non-key attributes.
    #[must_use]
    pub fn with_field_types(mut self, field_types: &'a HashMap<String, ScalarType>) -> Self {
        self.field_types = Some(field_types);
        self
    }

    /// Page size when none is given, and the cap on any given size.
    #[must_use]
    pub fn with_limits(mut self, default_limit: usize, max_limit: usize) -> Self {
        self.max_limit = max_limit.max(1);
        self.default_limit = default_limit.clamp(1, self.max_limit);
        self
    }

    /// Build the descriptor of a request.
    pub fn build(
        &self,
        query: &[(String, String)],
        path: &PathKeys,
    ) -> Result<FilterDescriptor, AdapterError> {
        let mut descriptor = FilterDescriptor {
            page_limit: self.default_limit,
            ..FilterDescriptor::default()
        };
        let mut values: BTreeMap<String, String> = BTreeMap::new();
        let mut ranges: BTreeMap<String, (Option<&str>, Option<&str>)> = BTreeMap::new();
        let mut offset_hash = None;
        let mut offset_range = None;
        let mut offset_index = None;

        for (name, value) in query {
            match name.to_ascii_lowercase().as_str() {
                "limit" => {
                    descriptor.page_limit = self.parse_limit(value)?;
                    descriptor.explicit_limit = true;
                }
                "reverse" => descriptor.sort_descending = parse_flag("reverse", value)?,
                "offset_special" => descriptor.offset_special = parse_flag("offset_special", value)?,
                "offset_hash" => offset_hash = Some(value.as_str()),
                "offset_range" => offset_range = Some(value.as_str()),
                "offset_index" => offset_index = Some(value.as_str()),
                "format" => {
                    if !value.eq_ignore_ascii_case("json") {
                        return Err(AdapterError::validation(format!(
                            "format '{value}' is not supported"
                        )));
                    }
                    descriptor.format = Some(value.clone());
                }
                _ => {
                    if let Some(attr) = strip_suffix_ignore_case(name, FROM_SUFFIX) {
                        ranges.entry(attr.to_owned()).or_default().0 = Some(value.as_str());
                    } else if let Some(attr) = strip_suffix_ignore_case(name, TO_SUFFIX) {
                        ranges.entry(attr.to_owned()).or_default().1 = Some(value.as_str());
                    } else {
                        values.insert(name.clone(), value.clone());
                    }
                }
            }
        }

        if let Some(hash) = &path.hash {
            values.insert(self.schema.hash_key.name.clone(), hash.clone());
        }
        if let (Some(range), Some(key)) = (&path.range, &self.schema.range_key) {
            values.insert(key.name.clone(), range.clone());
        }

        for (attr, raw) in values {
            if let Some(predicate) = self.value_predicate(&attr, &raw)? {
                descriptor.predicates.insert(attr.clone(), predicate);
                descriptor.raw_values.insert(attr, raw);
            }
        }
        for (attr, bounds) in ranges {
            let predicate = self.range_predicate(&attr, bounds)?;
            if descriptor.predicates.contains_key(&attr) {
                return Err(AdapterError::validation(format!(
                    "'{attr}' cannot be filtered by both a value and a range"
                )));
            }
            descriptor.predicates.insert(attr, predicate);
        }

        descriptor.selected_index = self.select_index(&descriptor.predicates);
        descriptor.exclusive_start_key = self.start_key(offset_hash, offset_range)?;
        if let Some(text) = offset_index {
            descriptor.exclusive_start_index_value = Some(self.start_index_value(&descriptor, text)?);
        }
        Ok(descriptor)
    }

    fn attribute_type(&self, attr: &str) -> Option<ScalarType> {
        self.schema
            .primary_key_attribute(attr)
            .or_else(|| {
                self.schema
                    .index_for_attribute(attr)
                    .map(|idx| &idx.indexed_attribute)
            })
            .map(|key| key.scalar_type)
            .or_else(|| self.field_types.and_then(|types| types.get(attr)).copied())
    }

    fn value_predicate(&self, attr: &str, raw: &str) -> Result<Option<Predicate>, AdapterError> {
        if let Some(prefix) = raw.strip_suffix('*') {
            if prefix.is_empty() {
                return Ok(None);
            }
            if self.attribute_type(attr) == Some(ScalarType::Numeric) {
                return Err(AdapterError::validation(format!(
                    "prefix match on numeric attribute '{attr}'"
                )));
            }
            return Ok(Some(Predicate::Prefix(prefix.to_owned())));
        }

        if let Some(key) = self.schema.primary_key_attribute(attr) {
            return coerce_key_text(key, raw).map(|v| Some(Predicate::Equality(v)));
        }

        let value = if raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("false") {
            AttributeValue::from_bool(raw.eq_ignore_ascii_case("true"))
        } else if self.attribute_type(attr) == Some(ScalarType::Numeric) {
            AttributeValue::parse_number(raw).ok_or_else(|| {
                AdapterError::validation(format!("'{raw}' is not a valid number for '{attr}'"))
            })?
        } else {
            AttributeValue::S(raw.to_owned())
        };
        Ok(Some(Predicate::Equality(value)))
    }

    fn range_predicate(
        &self,
        attr: &str,
        bounds: (Option<&str>, Option<&str>),
    ) -> Result<Predicate, AdapterError> {
        let (Some(from), Some(to)) = bounds else {
            return Err(AdapterError::validation(format!(
                "range on '{attr}' needs both {attr}{FROM_SUFFIX} and {attr}{TO_SUFFIX}"
            )));
        };

        let key = if self.schema.is_range_key(attr) {
            self.schema.range_key.as_ref()
        } else if self.schema.is_hash_key(attr) {
            None
        } else {
            self.schema
                .index_for_attribute(attr)
                .map(|idx| &idx.indexed_attribute)
        };
        let Some(key) = key else {
            return Err(AdapterError::validation(format!(
                "'{attr}' is neither the range key nor an indexed attribute"
            )));
        };
        if !key.is_numeric() {
            return Err(AdapterError::validation(format!(
                "range on '{attr}' requires a numeric attribute"
            )));
        }

        let parse = |text: &str| {
            text.trim().parse::<i64>().map_err(|_| {
                AdapterError::validation(format!("range bound '{text}' of '{attr}' is not an integer"))
            })
        };
        let (lower, upper) = (parse(from)?, parse(to)?);
        if lower > upper {
            return Err(AdapterError::validation(format!(
                "range on '{attr}' has lower bound {lower} above upper bound {upper}"
            )));
        }
        Ok(Predicate::Between { lower, upper })
    }

    fn select_index(&self, predicates: &BTreeMap<String, Predicate>) -> Option<String> {
        let touched: BTreeSet<&str> = predicates
            .keys()
            .filter(|attr| !self.schema.is_primary_key(attr))
            .filter_map(|attr| self.schema.index_for_attribute(attr))
            .map(|idx| idx.name.as_str())
            .collect();
        match touched.len() {
            1 => touched.into_iter().next().map(str::to_owned),
            _ => None,
        }
    }

    fn start_key(
        &self,
        offset_hash: Option<&str>,
        offset_range: Option<&str>,
    ) -> Result<Option<PrimaryKey>, AdapterError> {
        let hash_key = &self.schema.hash_key;
        match (offset_hash, offset_range, &self.schema.range_key) {
            (None, None, _) => Ok(None),
            (Some(hash), None, None) => Ok(Some(PrimaryKey::hash(coerce_key_text(hash_key, hash)?))),
            (Some(hash), Some(range), Some(range_key)) => Ok(Some(PrimaryKey::hash_range(
                coerce_key_text(hash_key, hash)?,
                coerce_key_text(range_key, range)?,
            ))),
            (_, Some(_), None) => Err(AdapterError::validation(
                "offset_range given for a table without range key",
            )),
            (Some(_), None, Some(_)) => Err(AdapterError::validation(
                "offset_hash requires offset_range on this table",
            )),
            (None, Some(_), Some(_)) => Err(AdapterError::validation(
                "offset_range requires offset_hash",
            )),
        }
    }

    fn start_index_value(
        &self,
        descriptor: &FilterDescriptor,
        text: &str,
    ) -> Result<AttributeValue, AdapterError> {
        if descriptor.exclusive_start_key.is_none() {
            return Err(AdapterError::validation("offset_index requires offset_hash"));
        }
        let index = descriptor
            .selected_index
            .as_ref()
            .and_then(|name| self.schema.indexes.get(name))
            .ok_or_else(|| AdapterError::validation("offset_index given without an index filter"))?;
        coerce_key_text(&index.indexed_attribute, text)
    }

    fn parse_limit(&self, value: &str) -> Result<usize, AdapterError> {
        match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n.min(self.max_limit)),
            _ => Err(AdapterError::validation(format!(
                "limit must be a positive integer, got '{value}'"
            ))),
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, AdapterError> {
    parse_bool(value)
        .ok_or_else(|| AdapterError::validation(format!("{name} must be true or false, got '{value}'")))
}

fn strip_suffix_ignore_case<'s>(name: &'s str, suffix: &str) -> Option<&'s str> {
    let split = name.len().checked_sub(suffix.len())?;
    let tail = name.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &name[..split])
}
