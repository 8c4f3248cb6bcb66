//! mongosh-style rendering of BSON values
//!
//! Extended types are shown with their shell wrappers (`ObjectId('…')`,
//! `ISODate('…')`, `Long('…')`, `NumberDecimal('…')`), keys are unquoted and
//! nested values are indented two spaces per level.

use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{Bson, Document};

use super::colorizer::Colorizer;

/// Shell-style formatter (mongosh compatible)
pub struct ShellFormatter {
    colorizer: Colorizer,
    indent: usize,
}

impl ShellFormatter {
    /// Create a new shell formatter
    pub fn new(colorizer: Colorizer) -> Self {
        Self {
            colorizer,
            indent: 2,
        }
    }

    /// Format a BSON document in shell style
    pub fn format_document(&self, doc: &Document) -> String {
        self.format_document_at(doc, 0)
    }

    /// Format a result set as a shell array
    pub fn format_documents(&self, docs: &[Document]) -> String {
        let values: Vec<Bson> = docs.iter().cloned().map(Bson::Document).collect();
        self.format_array(&values, 0)
    }

    /// Format any BSON value at the top level
    pub fn format_value(&self, value: &Bson) -> String {
        self.format_bson_value(value, 0)
    }

    fn format_document_at(&self, doc: &Document, indent_level: usize) -> String {
        if doc.is_empty() {
            return "{}".to_string();
        }

        let indent = " ".repeat((indent_level + 1) * self.indent);
        let entries: Vec<String> = doc
            .iter()
            .map(|(key, value)| {
                format!(
                    "{indent}{}: {}",
                    self.colorizer.field_key(key),
                    self.format_bson_value(value, indent_level + 1)
                )
            })
            .collect();

        format!(
            "{{\n{}\n{}}}",
            entries.join(",\n"),
            " ".repeat(indent_level * self.indent)
        )
    }

    fn format_array(&self, arr: &[Bson], indent_level: usize) -> String {
        if arr.is_empty() {
            return "[]".to_string();
        }

        let indent = " ".repeat((indent_level + 1) * self.indent);
        let items: Vec<String> = arr
            .iter()
            .map(|value| format!("{indent}{}", self.format_bson_value(value, indent_level + 1)))
            .collect();

        format!(
            "[\n{}\n{}]",
            items.join(",\n"),
            " ".repeat(indent_level * self.indent)
        )
    }

    fn format_bson_value(&self, value: &Bson, indent_level: usize) -> String {
        match value {
            Bson::ObjectId(oid) => self.colorizer.type_wrapper("ObjectId", &oid.to_hex()),
            Bson::DateTime(dt) => {
                let iso = dt
                    .try_to_rfc3339_string()
                    .unwrap_or_else(|_| dt.timestamp_millis().to_string());
                self.colorizer.iso_date(&iso)
            }
            Bson::Int64(n) => self.colorizer.type_wrapper("Long", &n.to_string()),
            Bson::Decimal128(d) => self.colorizer.type_wrapper("NumberDecimal", &d.to_string()),
            Bson::String(s) => self.colorizer.string(s),
            Bson::Int32(n) => self.colorizer.number(&n.to_string()),
            Bson::Double(f) => self.colorizer.number(&format_double(*f)),
            Bson::Boolean(b) => self.colorizer.boolean(*b),
            Bson::Null => self.colorizer.null("null"),
            Bson::Undefined => self.colorizer.null("undefined"),
            Bson::Array(arr) => self.format_array(arr, indent_level),
            Bson::Document(doc) => self.format_document_at(doc, indent_level),
            Bson::Binary(bin) => self
                .colorizer
                .bin_data(binary_subtype(bin.subtype), &hex::encode(&bin.bytes)),
            Bson::RegularExpression(regex) => self.colorizer.regex(&regex.pattern, &regex.options),
            Bson::Timestamp(ts) => self.colorizer.timestamp(ts.time, ts.increment),
            Bson::MinKey => "MinKey()".to_string(),
            Bson::MaxKey => "MaxKey()".to_string(),
            other => format!("{other}"),
        }
    }
}

/// Doubles print without a trailing `.0` for whole values, like mongosh
pub(crate) fn format_double(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 {
        format!("{f:.0}")
    } else {
        f.to_string()
    }
}

pub(crate) fn binary_subtype(subtype: BinarySubtype) -> u8 {
    match subtype {
        BinarySubtype::Generic => 0,
        BinarySubtype::Function => 1,
        BinarySubtype::BinaryOld => 2,
        BinarySubtype::UuidOld => 3,
        BinarySubtype::Uuid => 4,
        BinarySubtype::Md5 => 5,
        BinarySubtype::Encrypted => 6,
        BinarySubtype::Column => 7,
        BinarySubtype::Sensitive => 8,
        BinarySubtype::UserDefined(n) => n,
        _ => 0,
    }
}
