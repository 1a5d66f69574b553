//! Scalar `AttributeValue` type with plain-JSON serialization.
//!
//! Stored rows are schema-less attribute bags, but every value the adapter
//! handles is a scalar: a string, a number, or null. The store has no native
//! boolean, so booleans are folded into the numbers `1` and `0` when values
//! enter the system.
//!
//! On the wire a value is rendered as the natural JSON scalar (`"abc"`, `42`,
//! `null`) rather than the tagged `{"S": "abc"}` form used by the store.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One stored row: attribute name to scalar value.
pub type Item = HashMap<String, AttributeValue>;

/// A scalar attribute value.
///
/// Numbers are kept in their canonical string form so that no precision is
/// lost between the store and the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    /// String value.
    S(String),
    /// Number value (string-encoded).
    N(String),
    /// Null value.
    Null,
}

impl AttributeValue {
    /// Build a number value from an integer.
    #[must_use]
    pub fn number(n: i64) -> Self {
        Self::N(n.to_string())
    }

    /// Build a number value from a decimal string, validating its format.
    ///
    /// Returns `None` when the text is not a finite decimal number.
    #[must_use]
    pub fn parse_number(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Some(Self::number(n));
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => Some(Self::N(trimmed.to_owned())),
            _ => None,
        }
    }

    /// Map a boolean onto the store's numeric encoding (`1` / `0`).
    #[must_use]
    pub fn from_bool(b: bool) -> Self {
        Self::number(i64::from(b))
    }

    /// Returns `true` if this is a string value.
    #[must_use]
    pub fn is_s(&self) -> bool {
        matches!(self, Self::S(_))
    }

    /// Returns `true` if this is a number value.
    #[must_use]
    pub fn is_n(&self) -> bool {
        matches!(self, Self::N(_))
    }

    /// Returns `true` if this is a null value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string value if this is an `S` variant.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number string if this is an `N` variant.
    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the number as `f64` if this is a parseable `N` variant.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_n().and_then(|n| n.parse::<f64>().ok())
    }

    /// Returns the number as `i64` if this is an integral `N` variant.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_n().and_then(|n| n.parse::<i64>().ok())
    }

    /// Returns the store type descriptor string (`"S"`, `"N"` or `"NULL"`).
    #[must_use]
    pub fn type_descriptor(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::Null => "NULL",
        }
    }
}

impl fmt::Display for AttributeValue {
    /// Formats the raw value, as it appears in URIs and query strings.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => f.write_str(s),
            Self::N(n) => f.write_str(n),
            Self::Null => Ok(()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::S(s.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::S(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::number(n)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::from_bool(b)
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::S(s) => serializer.serialize_str(s),
            Self::N(n) => {
                if let Ok(i) = n.parse::<i64>() {
                    serializer.serialize_i64(i)
                } else if let Ok(f) = n.parse::<f64>() {
                    serializer.serialize_f64(f)
                } else {
                    serializer.serialize_str(n)
                }
            }
            Self::Null => serializer.serialize_unit(),
        }
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AttributeValueVisitor)
    }
}

struct AttributeValueVisitor;

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a string, number, boolean or null")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(AttributeValue::S(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(AttributeValue::S(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(AttributeValue::number(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(AttributeValue::N(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v.is_finite() {
            Ok(AttributeValue::N(v.to_string()))
        } else {
            Err(E::custom("non-finite numbers cannot be stored"))
        }
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(AttributeValue::from_bool(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(AttributeValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(AttributeValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_as_plain_json_scalars() {
        assert_eq!(
            serde_json::to_string(&AttributeValue::S("hello".to_owned())).unwrap(),
            r#""hello""#
        );
        assert_eq!(
            serde_json::to_string(&AttributeValue::number(42)).unwrap(),
            "42"
        );
        assert_eq!(
            serde_json::to_string(&AttributeValue::N("1.5".to_owned())).unwrap(),
            "1.5"
        );
        assert_eq!(serde_json::to_string(&AttributeValue::Null).unwrap(), "null");
    }

    #[test]
    fn test_should_fold_booleans_into_numbers() {
        let val: AttributeValue = serde_json::from_str("true").unwrap();
        assert_eq!(val, AttributeValue::number(1));
        let val: AttributeValue = serde_json::from_str("false").unwrap();
        assert_eq!(val, AttributeValue::number(0));
    }

    #[test]
    fn test_should_reject_nested_values() {
        assert!(serde_json::from_str::<AttributeValue>("[1, 2]").is_err());
        assert!(serde_json::from_str::<AttributeValue>(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn test_should_parse_number_strings() {
        assert_eq!(
            AttributeValue::parse_number(" 17 "),
            Some(AttributeValue::number(17))
        );
        assert_eq!(
            AttributeValue::parse_number("2.25"),
            Some(AttributeValue::N("2.25".to_owned()))
        );
        assert_eq!(AttributeValue::parse_number("abc"), None);
        assert_eq!(AttributeValue::parse_number(""), None);
        assert_eq!(AttributeValue::parse_number("inf"), None);
    }

    #[test]
    fn test_should_display_raw_value() {
        assert_eq!(AttributeValue::S("alice".to_owned()).to_string(), "alice");
        assert_eq!(AttributeValue::number(-3).to_string(), "-3");
        assert_eq!(AttributeValue::Null.to_string(), "");
    }
}
