//! Aggregation stages and expressions for the in-memory store
//!
//! Supported stages: `$match`, `$group`, `$sort`, `$limit`, `$skip`,
//! `$project`, `$count`. Groups are emitted in the order their key is first
//! seen, and `$sort` is stable, so equal sort keys keep their input order.

use std::cmp::Ordering;

use mongodb::bson::{Bson, Document};

use super::query::{as_f64, compare_values, get_path, matches, sort_documents, truthy, values_equal};
use super::update::{remove_path, set_path};
use crate::error::{OperationError, Result};

/// Integer-or-float intermediate used by arithmetic and `$sum`
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }

    pub(crate) fn add(a: Number, b: Number) -> Number {
        match (a, b) {
            (Number::Int(x), Number::Int(y)) => x
                .checked_add(y)
                .map_or(Number::Float(x as f64 + y as f64), Number::Int),
            _ => Number::Float(a.as_f64() + b.as_f64()),
        }
    }

    fn sub(a: Number, b: Number) -> Number {
        match (a, b) {
            (Number::Int(x), Number::Int(y)) => x
                .checked_sub(y)
                .map_or(Number::Float(x as f64 - y as f64), Number::Int),
            _ => Number::Float(a.as_f64() - b.as_f64()),
        }
    }

    fn mul(a: Number, b: Number) -> Number {
        match (a, b) {
            (Number::Int(x), Number::Int(y)) => x
                .checked_mul(y)
                .map_or(Number::Float(x as f64 * y as f64), Number::Int),
            _ => Number::Float(a.as_f64() * b.as_f64()),
        }
    }
}

pub(crate) fn to_number(value: &Bson) -> Option<Number> {
    match value {
        Bson::Int32(n) => Some(Number::Int(i64::from(*n))),
        Bson::Int64(n) => Some(Number::Int(*n)),
        Bson::Double(f) => Some(Number::Float(*f)),
        _ => None,
    }
}

/// Integers narrow to Int32 when every operand was Int32 and the result fits
pub(crate) fn number_to_bson(n: Number, prefer_i32: bool) -> Bson {
    match n {
        Number::Int(v) if prefer_i32 => i32::try_from(v).map_or(Bson::Int64(v), Bson::Int32),
        Number::Int(v) => Bson::Int64(v),
        Number::Float(f) => Bson::Double(f),
    }
}

/// Run a pipeline over a snapshot of the collection
pub(crate) fn run(mut docs: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>> {
    for stage in pipeline {
        let mut entries = stage.iter();
        let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
            return Err(OperationError::InvalidParameters(
                "each pipeline stage must have exactly one field".to_string(),
            )
            .into());
        };

        docs = match name.as_str() {
            "$match" => {
                let filter = stage_document(name, spec)?;
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if matches(&doc, filter)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$group" => group(&docs, stage_document(name, spec)?)?,
            "$sort" => {
                sort_documents(&mut docs, stage_document(name, spec)?)?;
                docs
            }
            "$limit" => {
                let n = stage_count(name, spec, 1)?;
                docs.into_iter().take(n).collect()
            }
            "$skip" => {
                let n = stage_count(name, spec, 0)?;
                docs.into_iter().skip(n).collect()
            }
            "$project" => {
                let spec = stage_document(name, spec)?;
                docs.iter()
                    .map(|doc| project(doc, spec))
                    .collect::<Result<Vec<_>>>()?
            }
            "$count" => count(name, spec, docs.len())?,
            other => return Err(OperationError::UnsupportedOperator(other.to_string()).into()),
        };
    }

    Ok(docs)
}

fn stage_document<'a>(name: &str, spec: &'a Bson) -> Result<&'a Document> {
    match spec {
        Bson::Document(doc) => Ok(doc),
        _ => Err(OperationError::InvalidParameters(format!("{name} expects a document")).into()),
    }
}

fn stage_count(name: &str, spec: &Bson, min: i64) -> Result<usize> {
    match as_f64(spec) {
        Some(n) if n.fract() == 0.0 && n >= min as f64 => Ok(n as usize),
        _ => Err(OperationError::InvalidParameters(format!(
            "{name} expects an integer of at least {min}"
        ))
        .into()),
    }
}

fn count(name: &str, spec: &Bson, total: usize) -> Result<Vec<Document>> {
    let field = match spec {
        Bson::String(s) if !s.is_empty() && !s.starts_with('$') && !s.contains('.') => s,
        _ => {
            return Err(OperationError::InvalidParameters(format!(
                "{name} expects a non-empty field name"
            ))
            .into());
        }
    };

    if total == 0 {
        return Ok(Vec::new());
    }

    let value = i32::try_from(total).map_or(Bson::Int64(total as i64), Bson::Int32);
    let mut doc = Document::new();
    doc.insert(field.clone(), value);
    Ok(vec![doc])
}

/* ========================= $group ========================= */

fn keep_extreme(current: &mut Option<Bson>, value: Option<Bson>, better: fn(Ordering) -> bool) {
    let Some(v) = value.filter(|v| !matches!(v, Bson::Null)) else {
        return;
    };
    if current.as_ref().is_none_or(|c| better(compare_values(&v, c))) {
        *current = Some(v);
    }
}

enum Accumulator {
    Sum { total: Number, all_i32: bool },
    Avg { sum: f64, count: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    First(Option<Bson>),
    Last(Option<Bson>),
    Push(Vec<Bson>),
}

impl Accumulator {
    fn new(op: &str) -> Result<Self> {
        Ok(match op {
            "$sum" => Accumulator::Sum { total: Number::Int(0), all_i32: true },
            "$avg" => Accumulator::Avg { sum: 0.0, count: 0 },
            "$min" => Accumulator::Min(None),
            "$max" => Accumulator::Max(None),
            "$first" => Accumulator::First(None),
            "$last" => Accumulator::Last(None),
            "$push" => Accumulator::Push(Vec::new()),
            other => return Err(OperationError::UnsupportedOperator(other.to_string()).into()),
        })
    }

    fn feed(&mut self, value: Option<Bson>, first_in_group: bool) {
        match self {
            Accumulator::Sum { total, all_i32 } => {
                if let Some(n) = value.as_ref().and_then(to_number) {
                    *all_i32 &= matches!(value, Some(Bson::Int32(_)));
                    *total = Number::add(*total, n);
                }
            }
            Accumulator::Avg { sum, count } => {
                if let Some(n) = value.as_ref().and_then(as_f64) {
                    *sum += n;
                    *count += 1;
                }
            }
            Accumulator::Min(current) => keep_extreme(current, value, Ordering::is_lt),
            Accumulator::Max(current) => keep_extreme(current, value, Ordering::is_gt),
            Accumulator::First(current) => {
                if first_in_group {
                    *current = Some(value.unwrap_or(Bson::Null));
                }
            }
            Accumulator::Last(current) => *current = Some(value.unwrap_or(Bson::Null)),
            Accumulator::Push(items) => {
                if let Some(v) = value {
                    items.push(v);
                }
            }
        }
    }

    fn finish(self) -> Bson {
        match self {
            Accumulator::Sum { total, all_i32 } => number_to_bson(total, all_i32),
            Accumulator::Avg { count: 0, .. } => Bson::Null,
            Accumulator::Avg { sum, count } => Bson::Double(sum / count as f64),
            Accumulator::Min(v) | Accumulator::Max(v) | Accumulator::First(v) | Accumulator::Last(v) => {
                v.unwrap_or(Bson::Null)
            }
            Accumulator::Push(items) => Bson::Array(items),
        }
    }
}

fn group(docs: &[Document], spec: &Document) -> Result<Vec<Document>> {
    let Some(id_expr) = spec.get("_id") else {
        return Err(OperationError::InvalidParameters(
            "$group requires an _id expression".to_string(),
        )
        .into());
    };

    let mut fields = Vec::new();
    for (name, acc) in spec.iter().filter(|(k, _)| k.as_str() != "_id") {
        let parsed = match acc {
            Bson::Document(d) if d.len() == 1 => d.iter().next(),
            _ => None,
        };
        let Some((op, expr)) = parsed else {
            return Err(OperationError::InvalidParameters(format!(
                "$group field '{name}' must be a single accumulator"
            ))
            .into());
        };
        Accumulator::new(op)?;
        fields.push((name.as_str(), op.as_str(), expr));
    }

    let mut groups: Vec<(Bson, Vec<Accumulator>)> = Vec::new();
    for doc in docs {
        let key = evaluate(id_expr, doc)?.unwrap_or(Bson::Null);
        let position = groups.iter().position(|(k, _)| values_equal(k, &key));
        let (index, first_in_group) = match position {
            Some(i) => (i, false),
            None => {
                let accs = fields
                    .iter()
                    .map(|(_, op, _)| Accumulator::new(op))
                    .collect::<Result<Vec<_>>>()?;
                groups.push((key, accs));
                (groups.len() - 1, true)
            }
        };

        for ((_, _, expr), acc) in fields.iter().zip(groups[index].1.iter_mut()) {
            acc.feed(evaluate(expr, doc)?, first_in_group);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accs)| {
            let mut out = Document::new();
            out.insert("_id", key);
            for ((name, _, _), acc) in fields.iter().zip(accs) {
                out.insert(*name, acc.finish());
            }
            out
        })
        .collect())
}

/* ========================= $project ========================= */

/// Apply an inclusion, exclusion or computed projection
pub(crate) fn project(doc: &Document, spec: &Document) -> Result<Document> {
    let mut include_id = true;
    let mut exclusions = Vec::new();
    let mut inclusions = Vec::new();

    for (field, value) in spec {
        let is_flag = matches!(value, Bson::Boolean(_)) || as_f64(value).is_some();
        if field == "_id" && is_flag {
            include_id = truthy(value);
        } else if is_flag && !truthy(value) {
            exclusions.push(field.as_str());
        } else {
            inclusions.push((field.as_str(), if is_flag { None } else { Some(value) }));
        }
    }

    if !exclusions.is_empty() && !inclusions.is_empty() {
        return Err(OperationError::InvalidParameters(
            "cannot mix exclusion with inclusion in a projection".to_string(),
        )
        .into());
    }

    if inclusions.is_empty() {
        let mut out = doc.clone();
        for field in exclusions {
            remove_path(&mut out, field);
        }
        if !include_id {
            out.remove("_id");
        }
        return Ok(out);
    }

    let mut out = Document::new();
    if include_id {
        if let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
    }
    for (field, expr) in inclusions {
        let value = match expr {
            None => get_path(doc, field).cloned(),
            Some(expr) => evaluate(expr, doc)?,
        };
        if let Some(value) = value {
            set_path(&mut out, field, value)?;
        }
    }

    Ok(out)
}

/* ========================= Expressions ========================= */

/// Evaluate an aggregation expression; `None` means the value is missing
pub(crate) fn evaluate(expr: &Bson, doc: &Document) -> Result<Option<Bson>> {
    match expr {
        Bson::String(s) if s.starts_with("$$") => {
            Err(OperationError::UnsupportedOperator(s.clone()).into())
        }
        Bson::String(s) if s.starts_with('$') => Ok(get_path(doc, &s[1..]).cloned()),
        Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => {
            let mut entries = d.iter();
            let (Some((op, arg)), None) = (entries.next(), entries.next()) else {
                return Err(OperationError::InvalidParameters(
                    "an expression object must have exactly one operator".to_string(),
                )
                .into());
            };
            operator(op, arg, doc).map(Some)
        }
        Bson::Document(d) => {
            let mut out = Document::new();
            for (key, value) in d {
                if let Some(v) = evaluate(value, doc)? {
                    out.insert(key.clone(), v);
                }
            }
            Ok(Some(Bson::Document(out)))
        }
        Bson::Array(items) => {
            let values = items
                .iter()
                .map(|item| -> Result<Bson> { Ok(evaluate(item, doc)?.unwrap_or(Bson::Null)) })
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(Bson::Array(values)))
        }
        literal => Ok(Some(literal.clone())),
    }
}

fn operator(op: &str, arg: &Bson, doc: &Document) -> Result<Bson> {
    if op == "$literal" {
        return Ok(arg.clone());
    }

    let operands = match arg {
        Bson::Array(items) => items.iter().collect::<Vec<_>>(),
        single => vec![single],
    };

    let mut values = Vec::with_capacity(operands.len());
    for operand in operands {
        values.push(evaluate(operand, doc)?.unwrap_or(Bson::Null));
    }

    // Arithmetic on null or missing input yields null.
    if values.iter().any(|v| matches!(v, Bson::Null)) {
        return Ok(Bson::Null);
    }

    let all_i32 = values.iter().all(|v| matches!(v, Bson::Int32(_)));
    let numbers = values
        .iter()
        .map(|v| {
            to_number(v).ok_or_else(|| {
                OperationError::InvalidParameters(format!("{op} only supports numeric operands"))
            })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let arity = |expected: usize| -> Result<()> {
        if numbers.len() == expected {
            Ok(())
        } else {
            Err(OperationError::InvalidParameters(format!(
                "{op} takes exactly {expected} argument(s)"
            ))
            .into())
        }
    };

    match op {
        "$add" => Ok(number_to_bson(
            numbers.iter().copied().fold(Number::Int(0), Number::add),
            all_i32,
        )),
        "$multiply" => Ok(number_to_bson(
            numbers.iter().copied().fold(Number::Int(1), Number::mul),
            all_i32,
        )),
        "$subtract" => {
            arity(2)?;
            Ok(number_to_bson(Number::sub(numbers[0], numbers[1]), all_i32))
        }
        "$divide" => {
            arity(2)?;
            let divisor = numbers[1].as_f64();
            if divisor == 0.0 {
                return Err(
                    OperationError::InvalidParameters("can't $divide by zero".to_string()).into(),
                );
            }
            Ok(Bson::Double(numbers[0].as_f64() / divisor))
        }
        "$floor" => {
            arity(1)?;
            Ok(match numbers[0] {
                Number::Float(f) => Bson::Double(f.floor()),
                int => number_to_bson(int, all_i32),
            })
        }
        other => Err(OperationError::UnsupportedOperator(other.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn shelf() -> Vec<Document> {
        vec![
            doc! { "_id": 1, "title": "1984", "author": "George Orwell", "genre": "Dystopian", "price": 10.0, "published_year": 1949 },
            doc! { "_id": 2, "title": "Animal Farm", "author": "George Orwell", "genre": "Political", "price": 8.0, "published_year": 1945 },
            doc! { "_id": 3, "title": "The Hobbit", "author": "J.R.R. Tolkien", "genre": "Fantasy", "price": 14.0, "published_year": 1937 },
            doc! { "_id": 4, "title": "Brave New World", "author": "Aldous Huxley", "genre": "Dystopian", "price": 12.0, "published_year": 1932 },
            doc! { "_id": 5, "title": "The Alchemist", "author": "Paulo Coelho", "genre": "Political", "price": 11.0, "published_year": 1988 },
        ]
    }

    #[test]
    fn test_average_price_by_genre_descending() {
        let pipeline = vec![
            doc! { "$group": { "_id": "$genre", "avgPrice": { "$avg": "$price" } } },
            doc! { "$sort": { "avgPrice": -1 } },
        ];
        let out = run(shelf(), &pipeline).unwrap();
        let genres: Vec<&str> = out.iter().map(|d| d.get_str("_id").unwrap()).collect();
        assert_eq!(genres, vec!["Fantasy", "Dystopian", "Political"]);
        assert_eq!(out[1].get_f64("avgPrice").unwrap(), 11.0);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let docs = vec![
            doc! { "genre": "B", "price": 5.0 },
            doc! { "genre": "A", "price": 5.0 },
            doc! { "genre": "C", "price": 9.0 },
        ];
        let pipeline = vec![
            doc! { "$group": { "_id": "$genre", "avgPrice": { "$avg": "$price" } } },
            doc! { "$sort": { "avgPrice": -1 } },
        ];
        let out = run(docs, &pipeline).unwrap();
        let genres: Vec<&str> = out.iter().map(|d| d.get_str("_id").unwrap()).collect();
        assert_eq!(genres, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_author_with_most_books() {
        let pipeline = vec![
            doc! { "$group": { "_id": "$author", "count": { "$sum": 1 } } },
            doc! { "$sort": { "count": -1 } },
            doc! { "$limit": 1 },
        ];
        let out = run(shelf(), &pipeline).unwrap();
        assert_eq!(out, vec![doc! { "_id": "George Orwell", "count": 2 }]);
    }

    #[test]
    fn test_books_per_decade() {
        let pipeline = vec![
            doc! { "$project": { "decade": { "$multiply": [ { "$floor": { "$divide": ["$published_year", 10] } }, 10 ] } } },
            doc! { "$group": { "_id": "$decade", "count": { "$sum": 1 } } },
            doc! { "$sort": { "_id": 1 } },
        ];
        let out = run(shelf(), &pipeline).unwrap();
        let decades: Vec<(f64, i32)> = out
            .iter()
            .map(|d| (d.get_f64("_id").unwrap(), d.get_i32("count").unwrap()))
            .collect();
        assert_eq!(decades, vec![(1930.0, 2), (1940.0, 2), (1980.0, 1)]);
    }

    #[test]
    fn test_projection_modes() {
        let book = shelf().remove(0);
        let included = project(&book, &doc! { "title": 1, "_id": 0 }).unwrap();
        assert_eq!(included, doc! { "title": "1984" });

        let excluded = project(&book, &doc! { "price": 0, "published_year": 0 }).unwrap();
        assert!(!excluded.contains_key("price"));
        assert!(excluded.contains_key("_id"));

        assert!(project(&book, &doc! { "title": 1, "price": 0 }).is_err());
    }

    #[test]
    fn test_match_skip_count() {
        let pipeline = vec![
            doc! { "$match": { "price": { "$gte": 10 } } },
            doc! { "$skip": 1 },
            doc! { "$count": "remaining" },
        ];
        let out = run(shelf(), &pipeline).unwrap();
        assert_eq!(out, vec![doc! { "remaining": 3 }]);

        let empty = run(Vec::new(), &[doc! { "$count": "n" }]).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_min_max_push() {
        let pipeline = vec![doc! {
            "$group": {
                "_id": null,
                "cheapest": { "$min": "$price" },
                "dearest": { "$max": "$price" },
                "titles": { "$push": "$title" }
            }
        }];
        let out = run(shelf(), &pipeline).unwrap();
        assert_eq!(out[0].get_f64("cheapest").unwrap(), 8.0);
        assert_eq!(out[0].get_f64("dearest").unwrap(), 14.0);
        assert_eq!(out[0].get_array("titles").unwrap().len(), 5);
    }

    #[test]
    fn test_unknown_stage_and_bad_stage_shape() {
        let err = run(shelf(), &[doc! { "$lookup": {} }]).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported operator: $lookup");

        assert!(run(shelf(), &[doc! { "$limit": 1, "$skip": 1 }]).is_err());
        assert!(run(shelf(), &[doc! { "$limit": 0 }]).is_err());
    }

    #[test]
    fn test_divide_by_zero() {
        let doc = doc! { "a": 1 };
        assert!(evaluate(&Bson::Document(doc! { "$divide": ["$a", 0] }), &doc).is_err());
    }
}
