//! Plan execution.
//!
//! Runs a [`QueryPlan`] against a table and returns one page of full items.
//! Rows read through a keys-only index are hydrated with a batch get before
//! they are returned or filtered.

use std::cmp::Ordering;

use tracing::debug;

use dynarest_model::{AttributeValue, Item, TableKeySchema};
use dynarest_storage::{PrimaryKey, QueryRequest, ScanRequest, SortableAttributeValue, Table};

use crate::error::AdapterError;
use crate::filter::FilterDescriptor;
use crate::planner::QueryPlan;

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    /// Key of the last returned item.
    pub last_key: PrimaryKey,
    /// Indexed attribute value of the last item, for index queries.
    pub index_value: Option<AttributeValue>,
    /// Range key bounds narrowed past the last returned item, for hybrid
    /// pages.
    pub resume_bounds: Option<ResumeBounds>,
}

/// Range key bounds of the next hybrid page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeBounds {
    /// The range key.
    pub attribute: String,
    /// Inclusive lower bound.
    pub lower: i64,
    /// Inclusive upper bound.
    pub upper: i64,
}

/// One page of results.
#[derive(Debug, Clone, Default)]
pub struct PageResult {
    /// Items in page order.
    pub items: Vec<Item>,
    /// Present when more items follow.
    pub continuation: Option<Continuation>,
}

/// Read settings of the resource.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Default range key direction.
    pub scan_index_forward: bool,
    /// Strongly consistent reads.
    pub consistent_read: bool,
}

/// Execute a plan built from `descriptor`.
pub fn execute(
    plan: &QueryPlan,
    descriptor: &FilterDescriptor,
    table: &dyn Table,
    schema: &TableKeySchema,
    options: ReadOptions,
) -> Result<PageResult, AdapterError> {
    let forward = options.scan_index_forward != descriptor.sort_descending;
    let limit = descriptor.page_limit;

    let result = match plan {
        QueryPlan::DirectQuery {
            hash_key,
            range_condition,
            index,
        } => {
            let request = QueryRequest {
                hash_key: hash_key.clone(),
                range_condition: range_condition.clone(),
                index: index.as_ref().map(|idx| idx.name.clone()),
                limit: Some(limit),
                exclusive_start_key: descriptor.exclusive_start_key.clone(),
                exclusive_start_index_value: index
                    .as_ref()
                    .and(descriptor.exclusive_start_index_value.clone()),
                scan_forward: forward,
                consistent_read: options.consistent_read,
            };
            let page = table.query(&request)?;
            let items = match index {
                Some(idx) if idx.needs_hydration() => hydrate(table, schema, &page.items)?,
                _ => page.items,
            };
            PageResult {
                items,
                continuation: page.last_evaluated_key.map(|last_key| Continuation {
                    last_key,
                    index_value: page.last_evaluated_index_value,
                    resume_bounds: None,
                }),
            }
        }
        QueryPlan::Scan { filters } => {
            let request = ScanRequest {
                filters: filters.clone(),
                limit: Some(limit),
                exclusive_start_key: descriptor.exclusive_start_key.clone(),
                attributes_to_get: None,
            };
            let page = table.scan(&request)?;
            PageResult {
                items: page.items,
                continuation: page.last_evaluated_key.map(|last_key| Continuation {
                    last_key,
                    index_value: None,
                    resume_bounds: None,
                }),
            }
        }
        QueryPlan::HybridQueryThenFilter { .. } => {
            execute_hybrid(plan, descriptor, table, schema, options, forward)?
        }
    };

    debug!(
        plan = plan.kind(),
        items = result.items.len(),
        more = result.continuation.is_some(),
        "executed list plan"
    );
    Ok(result)
}

fn execute_hybrid(
    plan: &QueryPlan,
    descriptor: &FilterDescriptor,
    table: &dyn Table,
    schema: &TableKeySchema,
    options: ReadOptions,
    forward: bool,
) -> Result<PageResult, AdapterError> {
    let QueryPlan::HybridQueryThenFilter {
        hash_key,
        index,
        index_condition,
        residual,
        range_key,
        range_bounds,
    } = plan
    else {
        return Ok(PageResult::default());
    };

    let mut request = QueryRequest::partition(hash_key.clone());
    request.index = Some(index.name.clone());
    request.range_condition = Some(index_condition.clone());
    request.consistent_read = options.consistent_read;
    let page = table.query(&request)?;
    let rows = if index.needs_hydration() {
        hydrate(table, schema, &page.items)?
    } else {
        page.items
    };

    let sort_key = |item: &Item| SortableAttributeValue::from_range_key(item.get(range_key));
    let resume_after = descriptor
        .offset_special
        .then_some(descriptor.exclusive_start_key.as_ref())
        .flatten()
        .and_then(|key| key.range_key.as_ref())
        .and_then(SortableAttributeValue::from_attribute_value);

    let mut matched: Vec<Item> = rows
        .into_iter()
        .filter(|item| residual.iter().all(|(attr, c)| c.matches(item.get(attr))))
        .filter(|item| {
            resume_after.as_ref().is_none_or(|after| {
                let order = sort_key(item).cmp(after);
                if forward {
                    order == Ordering::Greater
                } else {
                    order == Ordering::Less
                }
            })
        })
        .collect();
    matched.sort_by(|a, b| {
        let order = sort_key(a).cmp(&sort_key(b));
        if forward { order } else { order.reverse() }
    });

    let limit = descriptor.page_limit;
    let has_more = matched.len() > limit;
    matched.truncate(limit);

    // A resume bound past the i64 range means nothing can follow.
    let continuation = if has_more {
        matched.last().and_then(|last| {
            let last_key = row_key(schema, last)?;
            let last_range = last.get(range_key).and_then(AttributeValue::as_n)?;
            let (mut lower, mut upper) = *range_bounds;
            if forward {
                lower = resume_lower(last_range)?;
            } else {
                upper = resume_upper(last_range)?;
            }
            Some(Continuation {
                last_key,
                index_value: None,
                resume_bounds: Some(ResumeBounds {
                    attribute: range_key.clone(),
                    lower,
                    upper,
                }),
            })
        })
    } else {
        None
    };

    Ok(PageResult {
        items: matched,
        continuation,
    })
}

/// Fetch full items for keys-only rows, keeping row order.
fn hydrate(table: &dyn Table, schema: &TableKeySchema, rows: &[Item]) -> Result<Vec<Item>, AdapterError> {
    let keys: Vec<PrimaryKey> = rows.iter().filter_map(|row| row_key(schema, row)).collect();
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    debug!(count = keys.len(), "hydrating keys-only index rows");
    Ok(table.batch_get(&keys)?)
}

/// Primary key of a stored row.
pub(crate) fn row_key(schema: &TableKeySchema, item: &Item) -> Option<PrimaryKey> {
    let hash = item.get(&schema.hash_key.name)?.clone();
    match schema.range_key_name() {
        Some(range) => Some(PrimaryKey::hash_range(hash, item.get(range)?.clone())),
        None => Some(PrimaryKey::hash(hash)),
    }
}

/// Integer part of a number text, truncated toward zero, and the sign of the
/// dropped fraction.
fn split_number(text: &str) -> Option<(i64, Ordering)> {
    let text = text.trim();
    if let Ok(whole) = text.parse::<i64>() {
        return Some((whole, Ordering::Equal));
    }
    if let Some((int, frac)) = text
        .split_once('.')
        .filter(|(_, frac)| !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()))
    {
        let whole = match int {
            "" | "-" | "+" => 0,
            digits => digits.parse::<i64>().ok()?,
        };
        let fraction = if frac.bytes().all(|b| b == b'0') {
            Ordering::Equal
        } else if int.starts_with('-') {
            Ordering::Less
        } else {
            Ordering::Greater
        };
        return Some((whole, fraction));
    }

    // Exponent notation.
    let value = text.parse::<f64>().ok().filter(|v| v.is_finite())?;
    let whole = value.trunc();
    #[allow(clippy::cast_precision_loss)]
    let in_range = whole >= i64::MIN as f64 && whole < i64::MAX as f64;
    if !in_range {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let whole = whole as i64;
    Some((whole, value.fract().partial_cmp(&0.0)?))
}

/// Smallest integer bound that resumes after `last` walking upwards.
fn resume_lower(last: &str) -> Option<i64> {
    match split_number(last)? {
        (whole, Ordering::Equal) => whole.checked_add(1),
        (whole, Ordering::Greater) => Some(whole),
        (whole, Ordering::Less) => whole.checked_sub(1),
    }
}

fn resume_upper(last: &str) -> Option<i64> {
    match split_number(last)? {
        (whole, Ordering::Equal) => whole.checked_sub(1),
        (whole, Ordering::Greater) => whole.checked_add(1),
        (whole, Ordering::Less) => Some(whole),
    }
}
