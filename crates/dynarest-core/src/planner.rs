//! Query planning.
//!
//! A partition query can carry one key condition: on the range key, or on
//! the indexed attribute when it reads through an index. Requests that need
//! more are either split into an index query plus an in-memory filter
//! (hybrid) or fall back to a scan.

use dynarest_model::{AttributeValue, SecondaryIndex, TableKeySchema};
use dynarest_storage::Condition;

use crate::filter::{FilterDescriptor, Predicate};

/// How a list request is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// One partition query, through an index or on the range key.
    DirectQuery {
        /// Partition to read.
        hash_key: AttributeValue,
        /// Condition on the range key, or on the index attribute.
        range_condition: Option<Condition>,
        /// Index to read through.
        index: Option<SecondaryIndex>,
    },
    /// Full-table scan with every predicate as a filter.
    Scan {
        /// Filters by attribute.
        filters: Vec<(String, Condition)>,
    },
    /// Unbounded index query, then filter, sort and page in memory.
    HybridQueryThenFilter {
        /// Partition to read.
        hash_key: AttributeValue,
        /// Index to read through.
        index: SecondaryIndex,
        /// Condition on the indexed attribute.
        index_condition: Condition,
        /// Predicates applied after the query, including the range bounds.
        residual: Vec<(String, Condition)>,
        /// Range key the result is sorted by.
        range_key: String,
        /// Inclusive bounds on the range key.
        range_bounds: (i64, i64),
    },
}

impl QueryPlan {
    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectQuery { .. } => "direct_query",
            Self::Scan { .. } => "scan",
            Self::HybridQueryThenFilter { .. } => "hybrid_query_then_filter",
        }
    }
}

/// Pick the plan for a descriptor.
///
/// - no hash key equality: scan
/// - at most one predicate besides the hash key, on the range key or on the
///   selected index's attribute: direct query
/// - a selected index with a predicate on its attribute and a range on the
///   range key: hybrid
/// - anything else: scan
#[must_use]
pub fn plan(descriptor: &FilterDescriptor, schema: &TableKeySchema) -> QueryPlan {
    let scan = || QueryPlan::Scan {
        filters: descriptor.conditions(),
    };
    let Some(hash_key) = descriptor.hash_equality(schema).cloned() else {
        return scan();
    };

    let others: Vec<(&String, &Predicate)> = descriptor
        .predicates
        .iter()
        .filter(|(attr, _)| !schema.is_hash_key(attr))
        .collect();
    let index = descriptor
        .selected_index
        .as_deref()
        .and_then(|name| schema.index(name));

    match others.as_slice() {
        [] => QueryPlan::DirectQuery {
            hash_key,
            range_condition: None,
            index: None,
        },
        [(attr, predicate)] => match index {
            Some(idx) if idx.indexed_attribute.name == **attr => QueryPlan::DirectQuery {
                hash_key,
                range_condition: Some(predicate.to_condition()),
                index: Some(idx.clone()),
            },
            None if schema.is_range_key(attr) => QueryPlan::DirectQuery {
                hash_key,
                range_condition: Some(predicate.to_condition()),
                index: None,
            },
            _ => scan(),
        },
        _ => hybrid(descriptor, schema, hash_key, index).unwrap_or_else(scan),
    }
}

fn hybrid(
    descriptor: &FilterDescriptor,
    schema: &TableKeySchema,
    hash_key: AttributeValue,
    index: Option<&SecondaryIndex>,
) -> Option<QueryPlan> {
    let index = index?;
    let range_key = schema.range_key_name()?;
    let index_attr = index.indexed_attribute.name.as_str();

    let index_condition = descriptor.predicates.get(index_attr)?.to_condition();
    let Some(Predicate::Between { lower, upper }) = descriptor.predicates.get(range_key) else {
        return None;
    };

    let residual = descriptor
        .predicates
        .iter()
        .filter(|(attr, _)| !schema.is_hash_key(attr) && attr.as_str() != index_attr)
        .map(|(attr, p)| (attr.clone(), p.to_condition()))
        .collect();

    Some(QueryPlan::HybridQueryThenFilter {
        hash_key,
        index: index.clone(),
        index_condition,
        residual,
        range_key: range_key.to_owned(),
        range_bounds: (*lower, *upper),
    })
}
