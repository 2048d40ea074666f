//! Query model for the data-access interface.
//!
//! A [`Query`] carries filters, ordering and an optional pagination window.
//! Backends may translate it into their native query language; the
//! evaluation helpers here are used by backends that work on JSON rows
//! directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering as CmpOrdering;

/// A single row as exchanged with the backend.
pub type Row = Map<String, Value>;

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Value must be one of the elements of an array.
    In,
    /// Case-insensitive substring match.
    Contains,
}

/// A column predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Creates a new filter.
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    /// `column IN values`
    pub fn is_in<V: Into<Value>>(column: impl Into<String>, values: Vec<V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self::new(column, FilterOp::In, Value::Array(values))
    }

    /// Returns true if the row satisfies this predicate.
    ///
    /// A missing column behaves like `null`, which only matches `Eq null`
    /// and `Neq <non-null>`.
    pub fn matches(&self, row: &Row) -> bool {
        let field = row.get(&self.column).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => values_equal(field, &self.value),
            FilterOp::Neq => !values_equal(field, &self.value),
            FilterOp::Gt => compare_values(field, &self.value) == Some(CmpOrdering::Greater),
            FilterOp::Gte => matches!(
                compare_values(field, &self.value),
                Some(CmpOrdering::Greater | CmpOrdering::Equal)
            ),
            FilterOp::Lt => compare_values(field, &self.value) == Some(CmpOrdering::Less),
            FilterOp::Lte => matches!(
                compare_values(field, &self.value),
                Some(CmpOrdering::Less | CmpOrdering::Equal)
            ),
            FilterOp::In => match &self.value {
                Value::Array(items) => items.iter().any(|item| values_equal(field, item)),
                _ => false,
            },
            FilterOp::Contains => match (field, &self.value) {
                (Value::String(haystack), Value::String(needle)) => haystack
                    .to_lowercase()
                    .contains(&needle.to_lowercase()),
                _ => false,
            },
        }
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ordering {
    pub column: String,
    pub ascending: bool,
}

/// Pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub offset: usize,
    pub limit: usize,
}

impl Range {
    /// Window for a zero-based page, or `None` if its offset overflows.
    pub fn page(page: usize, per_page: usize) -> Option<Self> {
        Some(Self {
            offset: page.checked_mul(per_page)?,
            limit: per_page,
        })
    }
}

/// A read request: filters, ordering, window and whether to count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub ordering: Vec<Ordering>,
    #[serde(default)]
    pub range: Option<Range>,
    /// Ask the backend for the total number of matching rows.
    #[serde(default)]
    pub count: bool,
}

impl Query {
    /// Creates an empty query (all rows, backend order).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds an equality filter.
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    /// Adds a `>=` filter.
    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::new(column, FilterOp::Gte, value))
    }

    /// Adds a `<=` filter.
    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::new(column, FilterOp::Lte, value))
    }

    /// Adds a case-insensitive substring filter.
    pub fn contains(self, column: impl Into<String>, needle: impl Into<String>) -> Self {
        self.filter(Filter::new(column, FilterOp::Contains, needle.into()))
    }

    /// Appends a sort key.
    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.ordering.push(Ordering {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Sets the pagination window.
    pub fn range(self, offset: usize, limit: usize) -> Self {
        self.window_of(Range { offset, limit })
    }

    /// Sets a prepared pagination window.
    pub fn window_of(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    /// Requests an exact count.
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Returns true if the row passes every filter.
    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Sorts rows in place by the query's ordering. Nulls sort last.
    pub fn sort(&self, rows: &mut [Row]) {
        if self.ordering.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for key in &self.ordering {
                let left = a.get(&key.column).unwrap_or(&Value::Null);
                let right = b.get(&key.column).unwrap_or(&Value::Null);
                let ord = match (left.is_null(), right.is_null()) {
                    (true, true) => CmpOrdering::Equal,
                    (true, false) => return CmpOrdering::Greater,
                    (false, true) => return CmpOrdering::Less,
                    (false, false) => compare_values(left, right).unwrap_or(CmpOrdering::Equal),
                };
                let ord = if key.ascending { ord } else { ord.reverse() };
                if ord != CmpOrdering::Equal {
                    return ord;
                }
            }
            CmpOrdering::Equal
        });
    }

    /// Applies the pagination window.
    pub fn window(&self, rows: Vec<Row>) -> Vec<Row> {
        match self.range {
            Some(range) => rows
                .into_iter()
                .skip(range.offset)
                .take(range.limit)
                .collect(),
            None => rows,
        }
    }
}

/// Result of a `select`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectResult {
    pub rows: Vec<Row>,
    /// Total matching rows before windowing, when requested.
    pub count: Option<usize>,
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Orders two JSON values of the same kind.
///
/// Strings that both parse as RFC 3339 timestamps are compared as instants,
/// so differing fractional-second precision does not affect the result.
pub fn compare_values(a: &Value, b: &Value) -> Option<CmpOrdering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (as_timestamp(a), as_timestamp(b)) {
            (Some(left), Some(right)) => Some(left.cmp(&right)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_filters() {
        let r = row(json!({"name": "Fantasy", "sort_order": 2, "active": true}));
        assert!(Filter::eq("name", "Fantasy").matches(&r));
        assert!(Filter::new("sort_order", FilterOp::Gt, 1).matches(&r));
        assert!(!Filter::new("sort_order", FilterOp::Lt, 2).matches(&r));
        assert!(Filter::new("name", FilterOp::Contains, "fan").matches(&r));
        assert!(Filter::is_in("sort_order", vec![1, 2]).matches(&r));
        assert!(Filter::eq("missing", Value::Null).matches(&r));
    }

    #[test]
    fn test_timestamp_comparison_ignores_precision() {
        let earlier = json!("2024-03-01T00:00:00Z");
        let later = json!("2024-03-01T00:00:00.500Z");
        assert_eq!(compare_values(&earlier, &later), Some(CmpOrdering::Less));
    }

    #[test]
    fn test_page_window() {
        assert_eq!(Range::page(2, 20), Some(Range { offset: 40, limit: 20 }));
        assert_eq!(Range::page(usize::MAX, 20), None);
        assert_eq!(Range::page(usize::MAX, 1), Some(Range { offset: usize::MAX, limit: 1 }));
    }

    #[test]
    fn test_sort_and_window() {
        let query = Query::new().order_by("sort_order", true).range(1, 2);
        let mut rows = vec![
            row(json!({"id": "c", "sort_order": 2})),
            row(json!({"id": "n"})),
            row(json!({"id": "a", "sort_order": 0})),
            row(json!({"id": "b", "sort_order": 1})),
        ];
        query.sort(&mut rows);
        let ids: Vec<_> = query
            .window(rows)
            .into_iter()
            .map(|r| r["id"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }
}
