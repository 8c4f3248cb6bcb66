//! JSON output
//!
//! BSON values are simplified to plain JSON rather than extended JSON:
//! ObjectIds and dates become strings, Int64 and Decimal128 become numbers,
//! binary data becomes a hex string. Pretty output can be colored with
//! `colored_json`; compact output is left uncolored for piping.

use colored_json::prelude::*;
use mongodb::bson::{Bson, Document};
use serde_json::{Map, Value, json};

use crate::runner::{Outcome, OutcomeData};

/// JSON formatter with pretty printing support
pub struct JsonFormatter {
    pretty: bool,
    indent: usize,
    use_colors: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    ///
    /// # Arguments
    /// * `pretty` - Enable pretty printing
    /// * `use_colors` - Color pretty output
    /// * `indent` - Spaces per indentation level
    pub fn new(pretty: bool, use_colors: bool, indent: usize) -> Self {
        Self {
            pretty,
            indent,
            use_colors,
        }
    }

    /// Render one outcome as a JSON object
    pub fn format_outcome(&self, outcome: &Outcome, show_timing: bool) -> String {
        self.render(&outcome_value(outcome, show_timing))
    }

    /// Render a single document
    pub fn format_document(&self, doc: &Document) -> String {
        self.render(&simplify_document(doc))
    }

    /// Render any JSON value with this formatter's layout
    pub fn render(&self, value: &Value) -> String {
        if !self.pretty {
            return value.to_string();
        }

        let json_str = self.to_pretty_string(value);
        if self.use_colors {
            json_str.to_colored_json_auto().unwrap_or(json_str)
        } else {
            json_str
        }
    }

    fn to_pretty_string(&self, value: &Value) -> String {
        let mut buf = Vec::new();
        let indent = " ".repeat(self.indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        match serde::Serialize::serialize(value, &mut ser) {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => value.to_string(),
        }
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new(true, false, 2)
    }
}

/// JSON object describing an outcome
pub(crate) fn outcome_value(outcome: &Outcome, show_timing: bool) -> Value {
    let mut object = Map::new();
    object.insert("name".into(), json!(outcome.name));
    object.insert("kind".into(), json!(outcome.kind));
    object.insert("success".into(), json!(outcome.success));

    match &outcome.error {
        Some(error) => {
            object.insert("error".into(), json!(error));
        }
        None => {
            object.insert("result".into(), payload_value(&outcome.data));
        }
    }

    if show_timing {
        object.insert("elapsedMs".into(), json!(outcome.elapsed_ms));
    }

    Value::Object(object)
}

fn payload_value(data: &OutcomeData) -> Value {
    match data {
        OutcomeData::Documents(docs) => {
            Value::Array(docs.iter().map(simplify_document).collect())
        }
        OutcomeData::Update { matched, modified } => json!({
            "acknowledged": true,
            "matchedCount": matched,
            "modifiedCount": modified,
        }),
        OutcomeData::Delete { deleted } => json!({
            "acknowledged": true,
            "deletedCount": deleted,
        }),
        OutcomeData::IndexCreated { name } => json!(name),
        OutcomeData::None => Value::Null,
    }
}

pub(crate) fn simplify_document(doc: &Document) -> Value {
    Value::Object(
        doc.iter()
            .map(|(key, value)| (key.clone(), simplify(value)))
            .collect(),
    )
}

/// Convert a BSON value to plain JSON
pub fn simplify(value: &Bson) -> Value {
    match value {
        Bson::Double(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Array(arr) => Value::Array(arr.iter().map(simplify).collect()),
        Bson::Document(doc) => simplify_document(doc),
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Int32(n) => json!(n),
        Bson::Int64(n) => json!(n),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(
            dt.try_to_rfc3339_string()
                .unwrap_or_else(|_| dt.timestamp_millis().to_string()),
        ),
        Bson::Decimal128(d) => {
            let s = d.to_string();
            s.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::String(s))
        }
        Bson::Binary(bin) => Value::String(hex::encode(&bin.bytes)),
        Bson::RegularExpression(regex) => {
            Value::String(format!("/{}/{}", regex.pattern, regex.options))
        }
        Bson::Timestamp(ts) => json!({ "t": ts.time, "i": ts.increment }),
        other => other.clone().into_relaxed_extjson(),
    }
}
