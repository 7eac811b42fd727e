//! Filter semantics shared by the in-memory backend and the operand checks
//! every backend runs before querying.

use std::cmp::Ordering;

use serde_json::Value;

use super::{Document, StoreError};
use crate::query::{Filter, FilterOperator, OrderBy, SortDirection};

/// Reject array-valued operators whose value is not an array
pub fn check_operands(filters: &[Filter]) -> Result<(), StoreError> {
    for filter in filters {
        if filter.operator.expects_array() && !filter.value.is_array() {
            return Err(StoreError::InvalidOperand {
                field: filter.field.clone(),
                operator: filter.operator.as_str(),
            });
        }
    }
    Ok(())
}

/// True when the document satisfies every filter
pub fn matches_all(document: &Document, filters: &[Filter]) -> bool {
    filters.iter().all(|f| matches(document, f))
}

pub fn matches(document: &Document, filter: &Filter) -> bool {
    let field = document.get(&filter.field);
    let value = &filter.value;

    match filter.operator {
        FilterOperator::Eq => match field {
            Some(f) => json_eq(f, value),
            None => false,
        },
        FilterOperator::Ne => matches!(field, Some(f) if !json_eq(f, value)),
        FilterOperator::Lt => compare_field(field, value, |o| o == Ordering::Less),
        FilterOperator::Lte => compare_field(field, value, |o| o != Ordering::Greater),
        FilterOperator::Gt => compare_field(field, value, |o| o == Ordering::Greater),
        FilterOperator::Gte => compare_field(field, value, |o| o != Ordering::Less),
        FilterOperator::In => match (field, value.as_array()) {
            (Some(f), Some(candidates)) => candidates.iter().any(|c| json_eq(f, c)),
            _ => false,
        },
        FilterOperator::NotIn => match (field, value.as_array()) {
            (Some(f), Some(candidates)) => !candidates.iter().any(|c| json_eq(f, c)),
            _ => false,
        },
        FilterOperator::ArrayContains => match field.and_then(Value::as_array) {
            Some(items) => items.iter().any(|i| json_eq(i, value)),
            None => false,
        },
        FilterOperator::ArrayContainsAny => match (field.and_then(Value::as_array), value.as_array()) {
            (Some(items), Some(candidates)) => items.iter().any(|i| candidates.iter().any(|c| json_eq(i, c))),
            _ => false,
        },
    }
}

fn compare_field(field: Option<&Value>, value: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    field.and_then(|f| compare_same_type(f, value)).map(accept).unwrap_or(false)
}

/// Equality with numbers compared by value, so `1` equals `1.0`
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b)),
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).map(|w| json_eq(v, w)).unwrap_or(false))
        }
        _ => a == b,
    }
}

/// Range comparison; values of different JSON types are incomparable
pub fn compare_same_type(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// Mirrors jsonb's cross-type ordering so both backends sort alike.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn total_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_same_type(x, y).unwrap_or_else(|| type_rank(x).cmp(&type_rank(y))),
    }
}

/// Stable sort; documents missing the field sort as smallest
pub fn sort_documents(documents: &mut [Document], order_by: &[OrderBy]) {
    if order_by.is_empty() {
        return;
    }
    documents.sort_by(|a, b| {
        for order in order_by {
            let ordering = total_cmp(a.get(&order.field), b.get(&order.field));
            let ordering = match order.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
