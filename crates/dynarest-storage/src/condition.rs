//! Key conditions and scan filters.

use std::ops::Bound;

use dynarest_model::AttributeValue;

use crate::key::SortableAttributeValue;

/// A condition on a single attribute.
///
/// Used both as the range condition of a query and as a per-attribute scan
/// filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Attribute equals the given value.
    Eq(AttributeValue),
    /// Attribute is between the two given values (inclusive).
    Between(AttributeValue, AttributeValue),
    /// String attribute begins with the given prefix.
    BeginsWith(String),
}

impl Condition {
    /// Evaluates the condition against an attribute value.
    ///
    /// Missing and null attributes never match. Comparisons across scalar
    /// types never match.
    #[must_use]
    pub fn matches(&self, value: Option<&AttributeValue>) -> bool {
        let Some(actual) = value.and_then(SortableAttributeValue::from_attribute_value) else {
            return false;
        };
        match self {
            Self::Eq(expected) => same_type_cmp(&actual, expected).is_some_and(|o| o.is_eq()),
            Self::Between(low, high) => {
                same_type_cmp(&actual, low).is_some_and(|o| o.is_ge())
                    && same_type_cmp(&actual, high).is_some_and(|o| o.is_le())
            }
            Self::BeginsWith(prefix) => {
                matches!(actual, SortableAttributeValue::S(ref s) if s.starts_with(prefix.as_str()))
            }
        }
    }

    /// The key range this condition selects, for conditions that map onto an
    /// ordered range. `BeginsWith` is handled separately.
    pub(crate) fn bounds(
        &self,
    ) -> Option<(Bound<SortableAttributeValue>, Bound<SortableAttributeValue>)> {
        match self {
            Self::Eq(v) => {
                let v = SortableAttributeValue::from_attribute_value(v)?;
                Some((Bound::Included(v.clone()), Bound::Included(v)))
            }
            Self::Between(low, high) => Some((
                Bound::Included(SortableAttributeValue::from_attribute_value(low)?),
                Bound::Included(SortableAttributeValue::from_attribute_value(high)?),
            )),
            Self::BeginsWith(_) => None,
        }
    }
}

fn same_type_cmp(
    actual: &SortableAttributeValue,
    expected: &AttributeValue,
) -> Option<std::cmp::Ordering> {
    let expected = SortableAttributeValue::from_attribute_value(expected)?;
    match (actual, &expected) {
        (SortableAttributeValue::S(_), SortableAttributeValue::S(_))
        | (SortableAttributeValue::N(_), SortableAttributeValue::N(_)) => {
            Some(actual.cmp(&expected))
        }
        _ => None,
    }
}
