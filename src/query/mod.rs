//! Generic query pipeline.
//!
//! Filter, then sort, then paginate, over a fully materialized item list.
//! Per-entity behavior comes from [`EntityTables`]: a table of filter-key
//! builders and a table of sort comparators. Unrecognized filter or sort
//! keys are ignored, recognized filters are ANDed, and only the first entry
//! of the requested sort map is applied.

pub mod tables;

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A compiled per-item filter.
pub type Predicate<T> = Box<dyn Fn(&T) -> bool>;

/// Turns a raw filter value into a predicate, or rejects it.
pub type PredicateBuilder<T> = fn(&Value) -> Option<Predicate<T>>;

/// Pure ordering between two items.
pub type Comparator<T> = fn(&T, &T) -> Ordering;

/// Filter and sort tables for one entity type.
pub struct EntityTables<T: 'static> {
    pub filters: &'static [(&'static str, PredicateBuilder<T>)],
    pub comparators: &'static [(&'static str, Comparator<T>)],
}

impl<T> EntityTables<T> {
    fn filter(&self, key: &str) -> Option<PredicateBuilder<T>> {
        self.filters
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, builder)| *builder)
    }

    fn comparator(&self, key: &str) -> Option<Comparator<T>> {
        self.comparators
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, cmp)| *cmp)
    }
}

/// One query request, as it arrives over the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryParam {
    /// Explicit candidate ids, overriding the full scan.
    pub keys: Option<Vec<u64>>,
    /// Per-field filter values. Open map; unknown keys are ignored.
    #[serde(rename = "where")]
    pub filter: Map<String, Value>,
    /// Ordered field -> ascending map. Only the first entry is applied.
    pub sort_by: IndexMap<String, bool>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl QueryParam {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(mut self, keys: Vec<u64>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_filter(mut self, key: &str, value: Value) -> Self {
        self.filter.insert(key.to_string(), value);
        self
    }

    pub fn with_sort(mut self, field: &str, ascending: bool) -> Self {
        self.sort_by.insert(field.to_string(), ascending);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    /// Ordered ids for the requested page.
    pub data: Vec<u64>,
    /// Whether ids exist beyond this slice.
    pub has_more: bool,
}

/// Runs the filter -> sort -> paginate pipeline over `(id, item)` rows.
pub fn run_query<T>(
    mut rows: Vec<(u64, &T)>,
    param: &QueryParam,
    tables: &EntityTables<T>,
) -> QueryPage {
    let mut predicates: Vec<Predicate<T>> = Vec::new();
    for (key, value) in &param.filter {
        if let Some(builder) = tables.filter(key) {
            if let Some(predicate) = builder(value) {
                predicates.push(predicate);
            }
        }
    }
    if !predicates.is_empty() {
        rows.retain(|(_, item)| predicates.iter().all(|p| p(item)));
    }

    if let Some((field, ascending)) = param.sort_by.first() {
        if let Some(cmp) = tables.comparator(field) {
            let ascending = *ascending;
            rows.sort_by(|a, b| {
                let ord = cmp(a.1, b.1);
                if ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
    }

    apply_paging(rows.into_iter().map(|(id, _)| id).collect(), param.offset, param.limit)
}

/// Slices `[offset, offset + limit)` out of the id list.
///
/// An absent limit returns everything from the offset onward.
pub fn apply_paging(ids: Vec<u64>, offset: usize, limit: Option<usize>) -> QueryPage {
    let total = ids.len();
    let start = offset.min(total);
    let end = match limit {
        Some(limit) => start.saturating_add(limit).min(total),
        None => total,
    };
    QueryPage {
        data: ids[start..end].to_vec(),
        has_more: end < total,
    }
}
