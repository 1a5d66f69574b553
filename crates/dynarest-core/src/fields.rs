//! Field declarations and object (de)hydration.
//!
//! A resource either declares its fields, in which case only those are read
//! from request bodies and rendered in responses, or declares none and
//! exposes every stored attribute as is.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use dynarest_model::{AttributeValue, Item, KeyAttribute, ScalarType, TableKeySchema};

use crate::error::AdapterError;
use crate::schema::coerce_key_text;

/// The value kind of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Decimal number.
    Numeric,
    /// Text.
    String,
    /// Boolean, stored as the number `1` or `0`.
    Boolean,
}

impl FieldKind {
    /// The scalar type values of this kind are stored as.
    #[must_use]
    pub fn scalar_type(self) -> ScalarType {
        match self {
            Self::Numeric | Self::Boolean => ScalarType::Numeric,
            Self::String => ScalarType::String,
        }
    }
}

/// A declared field of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Attribute name, also the JSON key.
    pub name: String,
    /// Value kind.
    pub kind: FieldKind,
    /// Rendered but never written from a request body.
    #[serde(default)]
    pub readonly: bool,
    /// Value used on create when the body omits the field.
    #[serde(default)]
    pub default: Option<AttributeValue>,
}

impl FieldSpec {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            readonly: false,
            default: None,
        }
    }

    /// A numeric field.
    #[must_use]
    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Numeric)
    }

    /// A string field.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    /// A boolean field.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Mark the field read-only.
    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Give the field a default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<AttributeValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A to-one link from an item to an object of another resource.
///
/// The target object's keys are read from this item's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedField {
    /// JSON key of the link.
    pub name: String,
    /// Name of the target resource.
    pub resource: String,
    /// Attribute holding the target's hash key.
    pub hash_attribute: String,
    /// Attribute holding the target's range key.
    #[serde(default)]
    pub range_attribute: Option<String>,
}

/// Whether absent fields take their defaults during hydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    /// Create or replace: defaults fill absent fields.
    Full,
    /// Merge: only fields present in the body are written.
    Partial,
}

/// The resolved field set of a resource.
#[derive(Debug, Clone)]
pub struct FieldSet {
    fields: Vec<FieldSpec>,
    keys: Vec<KeyAttribute>,
}

impl FieldSet {
    /// Build the field set, injecting key fields when `build_primary_keys` is
    /// set and the key is not declared already.
    #[must_use]
    pub fn new(declared: Vec<FieldSpec>, schema: &TableKeySchema, build_primary_keys: bool) -> Self {
        let keys: Vec<KeyAttribute> = std::iter::once(schema.hash_key.clone())
            .chain(schema.range_key.clone())
            .collect();

        let mut fields = Vec::with_capacity(declared.len() + keys.len());
        if build_primary_keys && !declared.is_empty() {
            for key in &keys {
                if !declared.iter().any(|f| f.name == key.name) {
                    let kind = match key.scalar_type {
                        ScalarType::Numeric => FieldKind::Numeric,
                        ScalarType::String => FieldKind::String,
                    };
                    fields.push(FieldSpec::new(key.name.clone(), kind));
                }
            }
        }
        fields.extend(declared);
        Self { fields, keys }
    }

    /// Whether every stored attribute is exposed.
    #[must_use]
    pub fn is_schemaless(&self) -> bool {
        self.fields.is_empty()
    }

    /// The declared fields, key fields first.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Stored scalar type of every declared field.
    #[must_use]
    pub fn scalar_types(&self) -> HashMap<String, ScalarType> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.kind.scalar_type()))
            .collect()
    }

    /// Turn a request body into an item.
    ///
    /// Key attributes present in the body are coerced to their declared
    /// types. Nulls are dropped.
    pub fn hydrate(&self, body: &Map<String, Value>, mode: Hydration) -> Result<Item, AdapterError> {
        let mut item = Item::new();

        for key in &self.keys {
            match body.get(&key.name) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    item.insert(key.name.clone(), coerce_key_json(key, value)?);
                }
            }
        }

        if self.is_schemaless() {
            for (name, value) in body {
                if name == "resource_uri" || item.contains_key(name) || value.is_null() {
                    continue;
                }
                let attr = serde_json::from_value::<AttributeValue>(value.clone())
                    .map_err(|e| AdapterError::validation(format!("field '{name}': {e}")))?;
                item.insert(name.clone(), attr);
            }
            return Ok(item);
        }

        for field in &self.fields {
            if field.readonly || self.keys.iter().any(|k| k.name == field.name) {
                continue;
            }
            let value = match body.get(&field.name) {
                Some(Value::Null) => None,
                Some(value) => Some(coerce_field(field, value)?),
                None if mode == Hydration::Full => field.default.clone(),
                None => None,
            };
            if let Some(value) = value.filter(|v| !v.is_null()) {
                item.insert(field.name.clone(), value);
            }
        }
        Ok(item)
    }

    /// Render an item as a JSON object.
    #[must_use]
    pub fn dehydrate(&self, item: &Item) -> Map<String, Value> {
        if self.is_schemaless() {
            return item
                .iter()
                .map(|(name, value)| (name.clone(), attribute_to_json(value)))
                .collect();
        }
        self.fields
            .iter()
            .map(|field| {
                let value = item
                    .get(&field.name)
                    .or(field.default.as_ref())
                    .map_or(Value::Null, |v| render_field(field.kind, v));
                (field.name.clone(), value)
            })
            .collect()
    }
}

/// Render a stored value as its natural JSON scalar.
#[must_use]
pub fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => n
            .parse::<i64>()
            .map(Value::from)
            .ok()
            .or_else(|| {
                n.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            })
            .unwrap_or_else(|| Value::String(n.clone())),
        AttributeValue::Null => Value::Null,
    }
}

fn render_field(kind: FieldKind, value: &AttributeValue) -> Value {
    match (kind, value) {
        (_, AttributeValue::Null) => Value::Null,
        (FieldKind::Boolean, AttributeValue::N(_)) => {
            Value::Bool(value.as_f64().is_some_and(|n| n != 0.0))
        }
        (FieldKind::Boolean, AttributeValue::S(s)) => parse_bool(s).map_or(Value::Null, Value::Bool),
        (FieldKind::String, AttributeValue::N(n) | AttributeValue::S(n)) => {
            Value::String(n.clone())
        }
        (FieldKind::Numeric, _) => match value {
            AttributeValue::S(s) => AttributeValue::parse_number(s)
                .map_or_else(|| Value::String(s.clone()), |n| attribute_to_json(&n)),
            _ => attribute_to_json(value),
        },
    }
}

fn coerce_field(field: &FieldSpec, value: &Value) -> Result<AttributeValue, AdapterError> {
    let invalid = || {
        AdapterError::validation(format!(
            "field '{}' expects a {} value, got {value}",
            field.name,
            match field.kind {
                FieldKind::Numeric => "numeric",
                FieldKind::String => "string",
                FieldKind::Boolean => "boolean",
            }
        ))
    };
    match (field.kind, value) {
        (_, Value::Array(_) | Value::Object(_)) => Err(invalid()),
        (FieldKind::Numeric, Value::Number(n)) => {
            AttributeValue::parse_number(&n.to_string()).ok_or_else(invalid)
        }
        (FieldKind::Numeric, Value::String(s)) => AttributeValue::parse_number(s).ok_or_else(invalid),
        (FieldKind::String, Value::String(s)) => Ok(AttributeValue::S(s.clone())),
        (FieldKind::String, Value::Number(n)) => Ok(AttributeValue::S(n.to_string())),
        (FieldKind::String, Value::Bool(b)) => Ok(AttributeValue::S(b.to_string())),
        (FieldKind::Boolean, Value::Bool(b)) => Ok(AttributeValue::from_bool(*b)),
        (FieldKind::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(AttributeValue::from_bool(false)),
            Some(1) => Ok(AttributeValue::from_bool(true)),
            _ => Err(invalid()),
        },
        (FieldKind::Boolean, Value::String(s)) => parse_bool(s)
            .map(AttributeValue::from_bool)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn coerce_key_json(key: &KeyAttribute, value: &Value) -> Result<AttributeValue, AdapterError> {
    match value {
        Value::String(s) => coerce_key_text(key, s),
        Value::Number(n) => coerce_key_text(key, &n.to_string()),
        other => Err(AdapterError::validation(format!(
            "key '{}' must be a string or number, got {other}",
            key.name
        ))),
    }
}

/// Parse a boolean spelled `true`/`false`/`1`/`0`, ignoring ASCII case.
#[must_use]
pub fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") || s == "1" {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") || s == "0" {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema() -> TableKeySchema {
        TableKeySchema {
            hash_key: KeyAttribute::new("userId", ScalarType::String),
            range_key: Some(KeyAttribute::new("ts", ScalarType::Numeric)),
            indexes: std::collections::BTreeMap::new(),
        }
    }

    fn declared() -> FieldSet {
        FieldSet::new(
            vec![
                FieldSpec::string("title"),
                FieldSpec::numeric("score").with_default(AttributeValue::number(0)),
                FieldSpec::boolean("done").with_default(false),
                FieldSpec::string("owner").readonly(),
            ],
            &schema(),
            true,
        )
    }

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test bodies are objects"),
        }
    }

    #[test]
    fn test_should_inject_key_fields_first() {
        let set = declared();
        let names: Vec<&str> = set.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["userId", "ts", "title", "score", "done", "owner"]);
    }

    #[test]
    fn test_should_hydrate_declared_fields_with_defaults() {
        let item = declared()
            .hydrate(
                &body(json!({
                    "userId": "alice",
                    "ts": "100",
                    "title": "hello",
                    "owner": "mallory",
                    "unknown": 1
                })),
                Hydration::Full,
            )
            .unwrap();
        assert_eq!(item["userId"], AttributeValue::S("alice".to_owned()));
        assert_eq!(item["ts"], AttributeValue::number(100));
        assert_eq!(item["score"], AttributeValue::number(0));
        assert_eq!(item["done"], AttributeValue::number(0));
        assert!(!item.contains_key("owner"));
        assert!(!item.contains_key("unknown"));
    }

    #[test]
    fn test_should_skip_defaults_on_partial_hydration() {
        let item = declared()
            .hydrate(&body(json!({"done": true})), Hydration::Partial)
            .unwrap();
        assert_eq!(item.len(), 1);
        assert_eq!(item["done"], AttributeValue::number(1));
    }

    #[test]
    fn test_should_reject_mistyped_values() {
        let fields = declared();
        for bad in [
            json!({"score": "many"}),
            json!({"done": "maybe"}),
            json!({"title": ["a"]}),
            json!({"ts": "later"}),
            json!({"userId": true}),
        ] {
            let err = fields.hydrate(&body(bad.clone()), Hydration::Full).unwrap_err();
            assert!(matches!(err, AdapterError::Validation(_)), "{bad}");
        }
    }

    #[test]
    fn test_should_dehydrate_declared_fields() {
        let item: Item = [
            ("userId", AttributeValue::S("alice".to_owned())),
            ("ts", AttributeValue::number(100)),
            ("done", AttributeValue::number(1)),
            ("secret", AttributeValue::S("x".to_owned())),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();

        let rendered = Value::Object(declared().dehydrate(&item));
        assert_eq!(
            rendered,
            json!({
                "userId": "alice",
                "ts": 100,
                "title": null,
                "score": 0,
                "done": true,
                "owner": null
            })
        );
    }

    #[test]
    fn test_should_pass_through_attributes_when_schemaless() {
        let fields = FieldSet::new(vec![], &schema(), true);
        assert!(fields.is_schemaless());

        let item = fields
            .hydrate(
                &body(json!({
                    "userId": "bob",
                    "ts": 5,
                    "flag": false,
                    "note": null,
                    "resource_uri": "/api/v1/x/"
                })),
                Hydration::Full,
            )
            .unwrap();
        assert_eq!(item.len(), 3);
        assert_eq!(item["flag"], AttributeValue::number(0));

        let rendered = Value::Object(fields.dehydrate(&item));
        assert_eq!(rendered, json!({"userId": "bob", "ts": 5, "flag": 0}));
    }

    #[test]
    fn test_should_render_decimal_numbers() {
        assert_eq!(
            attribute_to_json(&AttributeValue::N("1.5".to_owned())),
            json!(1.5)
        );
        assert_eq!(attribute_to_json(&AttributeValue::Null), Value::Null);
    }

    #[test]
    fn test_should_parse_bool_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
