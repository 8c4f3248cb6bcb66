//! Update operators for the in-memory store (`$set`, `$unset`, `$inc`)

use mongodb::bson::{Bson, Document};

use super::pipeline::{Number, number_to_bson, to_number};
use crate::error::{OperationError, Result};

/// Apply an update document in place, returning whether anything changed
pub(crate) fn apply_update(doc: &mut Document, update: &Document) -> Result<bool> {
    if update.is_empty() || update.keys().any(|k| !k.starts_with('$')) {
        return Err(OperationError::InvalidParameters(
            "update document requires atomic operators such as $set".to_string(),
        )
        .into());
    }

    let mut changed = false;
    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(
                OperationError::InvalidParameters(format!("{op} expects a document")).into(),
            );
        };

        for (path, value) in fields {
            if path == "_id" || path.starts_with("_id.") {
                return Err(OperationError::InvalidParameters(
                    "the field '_id' is immutable".to_string(),
                )
                .into());
            }

            changed |= match op.as_str() {
                "$set" => set_path(doc, path, value.clone())?,
                "$unset" => remove_path(doc, path),
                "$inc" => increment(doc, path, value)?,
                other => {
                    return Err(OperationError::UnsupportedOperator(other.to_string()).into());
                }
            };
        }
    }

    Ok(changed)
}

fn increment(doc: &mut Document, path: &str, by: &Bson) -> Result<bool> {
    let Some(delta) = to_number(by) else {
        return Err(OperationError::InvalidParameters(format!(
            "cannot $inc '{path}' by a non-numeric value"
        ))
        .into());
    };

    let next = match super::query::get_path(doc, path) {
        None => by.clone(),
        Some(current) => {
            let Some(base) = to_number(current) else {
                return Err(OperationError::InvalidParameters(format!(
                    "cannot $inc non-numeric field '{path}'"
                ))
                .into());
            };
            let both_i32 = matches!(current, Bson::Int32(_)) && matches!(by, Bson::Int32(_));
            number_to_bson(Number::add(base, delta), both_i32)
        }
    };

    set_path(doc, path, next)
}

/// Set a dotted path, creating intermediate documents
pub(crate) fn set_path(doc: &mut Document, path: &str, value: Bson) -> Result<bool> {
    match path.split_once('.') {
        None => {
            let changed = doc.get(path) != Some(&value);
            doc.insert(path, value);
            Ok(changed)
        }
        Some((head, rest)) => {
            if !doc.contains_key(head) {
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(OperationError::InvalidParameters(format!(
                    "cannot create field '{rest}' inside non-document '{head}'"
                ))
                .into()),
            }
        }
    }
}

/// Remove a dotted path, returning whether it existed
pub(crate) fn remove_path(doc: &mut Document, path: &str) -> bool {
    match path.split_once('.') {
        None => doc.remove(path).is_some(),
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(inner)) => remove_path(inner, rest),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_set_reports_change_only_when_value_differs() {
        let mut book = doc! { "title": "1984", "price": 10.99 };
        assert!(apply_update(&mut book, &doc! { "$set": { "price": 13.99 } }).unwrap());
        assert_eq!(book.get_f64("price").unwrap(), 13.99);
        assert!(!apply_update(&mut book, &doc! { "$set": { "price": 13.99 } }).unwrap());
    }

    #[test]
    fn test_nested_set_and_unset() {
        let mut book = doc! { "title": "Dune" };
        apply_update(&mut book, &doc! { "$set": { "stock.warehouse": 4 } }).unwrap();
        assert_eq!(book, doc! { "title": "Dune", "stock": { "warehouse": 4 } });

        assert!(apply_update(&mut book, &doc! { "$unset": { "stock.warehouse": "" } }).unwrap());
        assert!(!apply_update(&mut book, &doc! { "$unset": { "missing": "" } }).unwrap());
    }

    #[test]
    fn test_inc_keeps_integer_type() {
        let mut book = doc! { "pages": 328 };
        apply_update(&mut book, &doc! { "$inc": { "pages": 2, "reprints": 1 } }).unwrap();
        assert_eq!(book.get_i32("pages").unwrap(), 330);
        assert_eq!(book.get_i32("reprints").unwrap(), 1);
    }

    #[test]
    fn test_replacement_style_update_rejected() {
        let mut book = doc! { "title": "1984" };
        let err = apply_update(&mut book, &doc! { "price": 1 }).unwrap_err();
        assert!(err.to_string().contains("atomic operators"));
    }

    #[test]
    fn test_id_is_immutable() {
        let mut book = doc! { "_id": 1, "title": "1984" };
        assert!(apply_update(&mut book, &doc! { "$set": { "_id": 2 } }).is_err());
    }

    #[test]
    fn test_unknown_update_operator() {
        let mut book = doc! { "tags": [] };
        let err = apply_update(&mut book, &doc! { "$push": { "tags": "x" } }).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported operator: $push");
    }
}
