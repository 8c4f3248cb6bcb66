//! Table output using tabled
//!
//! Columns are the union of all document keys with `_id` first. Long values
//! wrap instead of being truncated; nested values are summarized inline.

use std::collections::BTreeSet;

use mongodb::bson::{Bson, Document};
use tabled::{
    builder::Builder,
    settings::{Alignment, Color, Modify, Style, object::Columns, object::Rows, width::Width},
};

use super::shell::format_double;

/// Maximum width for a single column (characters)
const DEFAULT_MAX_COLUMN_WIDTH: usize = 40;

/// Table formatter for document collections
pub struct TableFormatter {
    max_column_width: usize,
    use_colors: bool,
}

impl TableFormatter {
    /// Create a new table formatter
    ///
    /// # Arguments
    /// * `use_colors` - Color the header row
    pub fn new(use_colors: bool) -> Self {
        Self {
            max_column_width: DEFAULT_MAX_COLUMN_WIDTH,
            use_colors,
        }
    }

    /// Format documents as a table
    pub fn format_documents(&self, docs: &[Document]) -> String {
        if docs.is_empty() {
            return "(empty result set)".to_string();
        }

        let fields = extract_field_names(docs);
        if fields.is_empty() {
            return "(no fields found)".to_string();
        }

        let rows = docs.iter().map(|doc| {
            fields
                .iter()
                .map(|field| doc.get(field).map(format_cell).unwrap_or_default())
                .collect::<Vec<_>>()
        });
        self.build(fields.clone(), rows)
    }

    /// Format arbitrary string rows under `header`
    pub fn format_rows<I>(&self, header: Vec<String>, rows: I) -> String
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        self.build(header, rows)
    }

    fn build<I>(&self, header: Vec<String>, rows: I) -> String
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let columns = header.len();
        let mut builder = Builder::default();
        builder.push_record(header);
        for row in rows {
            builder.push_record(row);
        }

        let mut table = builder.build();
        table.with(Style::modern());

        for i in 0..columns {
            table.with(Modify::new(Columns::new(i..=i)).with(Width::wrap(self.max_column_width)));
        }
        table.with(Modify::new(Rows::first()).with(Alignment::center()));

        if self.use_colors {
            table.modify(Rows::first(), Color::FG_CYAN | Color::BOLD);
        }

        table.to_string()
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Unique field names across documents, `_id` first
fn extract_field_names(docs: &[Document]) -> Vec<String> {
    let fields: BTreeSet<&String> = docs.iter().flat_map(|doc| doc.keys()).collect();
    let mut fields: Vec<String> = fields.into_iter().cloned().collect();

    if let Some(pos) = fields.iter().position(|f| f == "_id") {
        let id = fields.remove(pos);
        fields.insert(0, id);
    }
    fields
}

/// Single-line rendering of a value for a table cell
fn format_cell(value: &Bson) -> String {
    match value {
        Bson::ObjectId(oid) => format!("ObjectId('{}')", oid.to_hex()),
        Bson::DateTime(dt) => {
            let iso = dt
                .try_to_rfc3339_string()
                .unwrap_or_else(|_| dt.timestamp_millis().to_string());
            format!("ISODate('{iso}')")
        }
        Bson::Int64(n) => format!("Long('{n}')"),
        Bson::Decimal128(d) => format!("NumberDecimal('{d}')"),
        Bson::String(s) => s.clone(),
        Bson::Int32(n) => n.to_string(),
        Bson::Double(f) => format_double(*f),
        Bson::Boolean(b) => b.to_string(),
        Bson::Null => "null".to_string(),
        Bson::Array(arr) if arr.is_empty() => "[]".to_string(),
        Bson::Array(arr) if arr.len() <= 3 => {
            let items: Vec<String> = arr.iter().map(format_cell).collect();
            format!("[{}]", items.join(", "))
        }
        Bson::Array(arr) => format!("[Array({})]", arr.len()),
        Bson::Document(doc) if doc.is_empty() => "{}".to_string(),
        Bson::Document(doc) if doc.len() <= 2 => {
            let fields: Vec<String> = doc
                .iter()
                .map(|(k, v)| format!("{k}: {}", format_cell(v)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
        Bson::Document(doc) => format!("{{Object({})}}", doc.len()),
        Bson::Binary(bin) => {
            let hex = hex::encode(&bin.bytes);
            if hex.len() > 16 {
                format!("Binary({}...)", &hex[..16])
            } else {
                format!("Binary({hex})")
            }
        }
        Bson::RegularExpression(regex) => format!("/{}/{}", regex.pattern, regex.options),
        Bson::Timestamp(ts) => format!("Timestamp({}, {})", ts.time, ts.increment),
        other => other.to_string(),
    }
}
