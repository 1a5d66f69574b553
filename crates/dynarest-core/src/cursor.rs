//! `next` link rendering.
//!
//! The link points at the list endpoint and carries everything the filter
//! builder needs to rebuild an equivalent descriptor: the start key (with
//! the indexed value for index queries), every filter as it was given, the
//! paging options, and for hybrid pages the `offset_special` marker with the
//! narrowed range bounds.

use crate::filter::{FilterDescriptor, Predicate};
use crate::reconciler::Continuation;

/// Render the `next` link of a page, `None` on the last page.
#[must_use]
pub fn next_uri(
    list_uri: &str,
    descriptor: &FilterDescriptor,
    continuation: Option<&Continuation>,
) -> Option<String> {
    let next = continuation?;
    let mut query = form_urlencoded::Serializer::new(String::new());

    query.append_pair("offset_hash", &next.last_key.hash_key.to_string());
    if let Some(range) = &next.last_key.range_key {
        query.append_pair("offset_range", &range.to_string());
    }
    if let Some(indexed) = &next.index_value {
        query.append_pair("offset_index", &indexed.to_string());
    }
    if next.resume_bounds.is_some() {
        query.append_pair("offset_special", "1");
    }

    for (attr, predicate) in &descriptor.predicates {
        if let Predicate::Between { lower, upper } = predicate {
            let (lower, upper) = match &next.resume_bounds {
                Some(bounds) if bounds.attribute == *attr => (bounds.lower, bounds.upper),
                _ => (*lower, *upper),
            };
            query.append_pair(&format!("{attr}__from"), &lower.to_string());
            query.append_pair(&format!("{attr}__to"), &upper.to_string());
        } else if let Some(raw) = descriptor.raw_values.get(attr) {
            query.append_pair(attr, raw);
        }
    }

    if descriptor.sort_descending {
        query.append_pair("reverse", "true");
    }
    if descriptor.explicit_limit {
        query.append_pair("limit", &descriptor.page_limit.to_string());
    }
    if let Some(format) = &descriptor.format {
        query.append_pair("format", format);
    }

    Some(format!("{list_uri}?{}", query.finish()))
}

#[cfg(test)]
mod tests {
    use dynarest_model::{
        AttributeValue, IndexProjection, KeyAttribute, ScalarType, SecondaryIndex, TableKeySchema,
    };
    use dynarest_storage::PrimaryKey;

    use super::*;
    use crate::filter::{FilterBuilder, PathKeys};
    use crate::planner::plan;
    use crate::reconciler::ResumeBounds;

    const LIST: &str = "/api/v1/events/";

    fn schema() -> TableKeySchema {
        let category = SecondaryIndex {
            name: "category-index".to_owned(),
            indexed_attribute: KeyAttribute::new("category", ScalarType::String),
            projection: IndexProjection::Full,
        };
        TableKeySchema {
            hash_key: KeyAttribute::new("userId", ScalarType::String),
            range_key: Some(KeyAttribute::new("ts", ScalarType::Numeric)),
            indexes: [(category.name.clone(), category)].into_iter().collect(),
        }
    }

    fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn decode(uri: &str) -> Vec<(String, String)> {
        let (_, query) = uri.split_once('?').unwrap();
        form_urlencoded::parse(query.as_bytes()).into_owned().collect()
    }

    fn continuation(range: i64, resume_bounds: Option<ResumeBounds>) -> Continuation {
        Continuation {
            last_key: PrimaryKey::hash_range(
                AttributeValue::S("alice smith".to_owned()),
                AttributeValue::number(range),
            ),
            index_value: None,
            resume_bounds,
        }
    }

    #[test]
    fn test_should_render_nothing_on_last_page() {
        assert_eq!(next_uri(LIST, &FilterDescriptor::default(), None), None);
    }

    #[test]
    fn test_should_echo_filters_and_paging_options() {
        let schema = schema();
        let descriptor = FilterBuilder::new(&schema)
            .build(
                &owned(&[("reverse", "1"), ("limit", "5"), ("format", "json"), ("title", "a&b*")]),
                &PathKeys {
                    hash: Some("alice smith".to_owned()),
                    range: Some("*".to_owned()),
                },
            )
            .unwrap();
        let uri = next_uri(LIST, &descriptor, Some(&continuation(150, None))).unwrap();
        assert!(uri.starts_with("/api/v1/events/?offset_hash=alice+smith&offset_range=150"));

        let params = decode(&uri);
        assert!(params.contains(&("userId".to_owned(), "alice smith".to_owned())));
        assert!(params.contains(&("title".to_owned(), "a&b*".to_owned())));
        assert!(params.contains(&("reverse".to_owned(), "true".to_owned())));
        assert!(params.contains(&("limit".to_owned(), "5".to_owned())));
        assert!(params.contains(&("format".to_owned(), "json".to_owned())));
        assert!(!params.iter().any(|(k, _)| k == "ts" || k == "offset_special"));
    }

    #[test]
    fn test_should_render_hybrid_resume_bounds() {
        let schema = schema();
        let descriptor = FilterBuilder::new(&schema)
            .build(
                &owned(&[
                    ("userId", "alice smith"),
                    ("category", "sports"),
                    ("ts__from", "100"),
                    ("ts__to", "200"),
                ]),
                &PathKeys::default(),
            )
            .unwrap();
        let next = continuation(
            160,
            Some(ResumeBounds {
                attribute: "ts".to_owned(),
                lower: 161,
                upper: 200,
            }),
        );
        let params = decode(&next_uri(LIST, &descriptor, Some(&next)).unwrap());
        for expected in [
            ("offset_special", "1"),
            ("offset_range", "160"),
            ("ts__from", "161"),
            ("ts__to", "200"),
            ("category", "sports"),
        ] {
            assert!(
                params.contains(&(expected.0.to_owned(), expected.1.to_owned())),
                "missing {expected:?} in {params:?}"
            );
        }
    }

    #[test]
    fn test_should_carry_index_value_for_index_queries() {
        let schema = schema();
        let builder = FilterBuilder::new(&schema);
        let first = builder
            .build(
                &owned(&[("userId", "alice smith"), ("category", "rock & roll")]),
                &PathKeys::default(),
            )
            .unwrap();
        let mut next = continuation(160, None);
        next.index_value = Some(AttributeValue::from("rock & roll"));

        let params = decode(&next_uri(LIST, &first, Some(&next)).unwrap());
        assert!(params.contains(&("offset_index".to_owned(), "rock & roll".to_owned())));

        let second = builder.build(&params, &PathKeys::default()).unwrap();
        assert_eq!(
            second.exclusive_start_index_value,
            Some(AttributeValue::from("rock & roll"))
        );
        assert_eq!(second.exclusive_start_key, Some(next.last_key));
    }

    #[test]
    fn test_should_rebuild_same_plan_shape_from_next_uri() {
        let schema = schema();
        let builder = FilterBuilder::new(&schema);
        for (pairs, bounds) in [
            (vec![("userId", "alice smith"), ("ts__from", "1"), ("ts__to", "500")], None),
            (vec![("category", "sports")], None),
            (
                vec![
                    ("userId", "alice smith"),
                    ("category", "sports"),
                    ("ts__from", "100"),
                    ("ts__to", "200"),
                ],
                Some(ResumeBounds {
                    attribute: "ts".to_owned(),
                    lower: 161,
                    upper: 200,
                }),
            ),
        ] {
            let first = builder.build(&owned(&pairs), &PathKeys::default()).unwrap();
            let uri = next_uri(LIST, &first, Some(&continuation(160, bounds))).unwrap();
            let second = builder.build(&decode(&uri), &PathKeys::default()).unwrap();

            assert_eq!(plan(&first, &schema).kind(), plan(&second, &schema).kind());
            assert_eq!(
                second.exclusive_start_key,
                Some(continuation(160, None).last_key)
            );
        }
    }
}
