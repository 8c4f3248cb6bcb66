//! Filter matching, value ordering and sorting for the in-memory store
//!
//! Covers the operator subset the bookstore catalogs use. Anything else is
//! rejected with [`OperationError::UnsupportedOperator`] rather than guessed.

use std::cmp::Ordering;

use mongodb::bson::{Bson, Document};

use crate::error::{OperationError, Result};

/// Canonical BSON type order used when comparing values of different types
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

/// Numeric view of a BSON value
pub(crate) fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

/// Total order over BSON values
pub(crate) fn compare_values(a: &Bson, b: &Bson) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Document(x), Bson::Document(y)) => {
            for ((kx, vx), (ky, vy)) in x.iter().zip(y.iter()) {
                let ord = kx.cmp(ky).then_with(|| compare_values(vx, vy));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Array(x), Bson::Array(y)) => {
            for (vx, vy) in x.iter().zip(y.iter()) {
                let ord = compare_values(vx, vy);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

/// Equality with numeric types compared by value
pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    type_rank(a) == type_rank(b) && compare_values(a, b) == Ordering::Equal
}

/// Resolve a dotted path such as `publisher.city`
pub(crate) fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        match current {
            Bson::Document(inner) => current = inner.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Test a document against a query filter
pub(crate) fn matches(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in logical_clauses(key, condition)? {
                    if !matches(doc, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in logical_clauses(key, condition)? {
                    if matches(doc, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for clause in logical_clauses(key, condition)? {
                    if matches(doc, clause)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => {
                return Err(OperationError::UnsupportedOperator(op.to_string()).into());
            }
            path => field_matches(get_path(doc, path), condition)?,
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn logical_clauses<'a>(op: &str, condition: &'a Bson) -> Result<Vec<&'a Document>> {
    let Bson::Array(items) = condition else {
        return Err(OperationError::InvalidParameters(format!("{op} requires an array")).into());
    };

    items
        .iter()
        .map(|item| match item {
            Bson::Document(clause) => Ok(clause),
            _ => Err(OperationError::InvalidParameters(format!(
                "{op} entries must be documents"
            ))
            .into()),
        })
        .collect()
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(doc) if doc.keys().next().is_some_and(|k| k.starts_with('$')) => Some(doc),
        _ => None,
    }
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> Result<bool> {
    let Some(operators) = is_operator_document(condition) else {
        return Ok(equals_match(value, condition));
    };

    for (op, arg) in operators {
        let matched = match op.as_str() {
            "$eq" => equals_match(value, arg),
            "$ne" => !equals_match(value, arg),
            "$gt" => ordered_match(value, arg, |o| o == Ordering::Greater),
            "$gte" => ordered_match(value, arg, |o| o != Ordering::Less),
            "$lt" => ordered_match(value, arg, |o| o == Ordering::Less),
            "$lte" => ordered_match(value, arg, |o| o != Ordering::Greater),
            "$in" => in_list(op, arg)?.iter().any(|v| equals_match(value, v)),
            "$nin" => !in_list(op, arg)?.iter().any(|v| equals_match(value, v)),
            "$exists" => truthy(arg) == value.is_some(),
            other => return Err(OperationError::UnsupportedOperator(other.to_string()).into()),
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn in_list<'a>(op: &str, arg: &'a Bson) -> Result<&'a Vec<Bson>> {
    match arg {
        Bson::Array(items) => Ok(items),
        _ => Err(OperationError::InvalidParameters(format!("{op} needs an array")).into()),
    }
}

/// Missing fields equal `null`; array fields match when any element does
fn equals_match(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(Bson::Array(items)) => {
            values_equal(&Bson::Array(items.clone()), target)
                || items.iter().any(|item| values_equal(item, target))
        }
        Some(v) => values_equal(v, target),
    }
}

/// Range comparisons only match values of the same type bracket
fn ordered_match(value: Option<&Bson>, target: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let compare = |v: &Bson| type_rank(v) == type_rank(target) && accept(compare_values(v, target));
    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(compare),
        Some(v) => compare(v),
    }
}

pub(crate) fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        other => as_f64(other).is_none_or(|n| n != 0.0),
    }
}

/// Stable sort by a `{field: 1 | -1, ...}` specification
pub(crate) fn sort_documents(docs: &mut [Document], spec: &Document) -> Result<()> {
    let mut keys = Vec::with_capacity(spec.len());
    for (field, direction) in spec {
        let descending = match as_f64(direction) {
            Some(d) if d == 1.0 => false,
            Some(d) if d == -1.0 => true,
            _ => {
                return Err(OperationError::InvalidParameters(format!(
                    "sort direction for '{field}' must be 1 or -1"
                ))
                .into());
            }
        };
        keys.push((field.as_str(), descending));
    }

    if keys.is_empty() {
        return Err(OperationError::InvalidParameters("sort specification is empty".into()).into());
    }

    docs.sort_by(|a, b| {
        for (field, descending) in &keys {
            let va = get_path(a, field).unwrap_or(&Bson::Null);
            let vb = get_path(b, field).unwrap_or(&Bson::Null);
            let ord = compare_values(va, vb);
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    Ok(())
}
