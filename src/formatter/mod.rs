//! Output formatting for run results
//!
//! Each [`Outcome`] renders as a header line naming the operation, followed by
//! its payload in the configured [`OutputFormat`]:
//! - `shell`: mongosh-style documents with type wrappers
//! - `json` / `json-pretty`: one JSON object per outcome
//! - `table`: tabled grids
//! - `compact`: a single summary line

mod colorizer;
mod json;
mod shell;
mod table;

use mongodb::bson::{Bson, Document, doc};
use serde_json::{Value, json};

use crate::catalog::Catalog;
use crate::config::{DisplayConfig, OutputFormat};
use crate::runner::{Outcome, OutcomeData, RunReport};

pub use colorizer::Colorizer;
pub use json::{JsonFormatter, simplify};
pub use shell::ShellFormatter;
pub use table::TableFormatter;

/// Renders outcomes, catalogs and run summaries
pub struct Formatter {
    format: OutputFormat,
    colorizer: Colorizer,
    show_timing: bool,
}

impl Formatter {
    /// Create a new formatter
    ///
    /// # Arguments
    /// * `format` - Output format
    /// * `use_colors` - Enable colored output
    pub fn new(format: OutputFormat, use_colors: bool) -> Self {
        Self {
            format,
            colorizer: Colorizer::new(use_colors),
            show_timing: false,
        }
    }

    /// Create a formatter from display configuration
    pub fn from_config(display: &DisplayConfig) -> Self {
        Self::new(display.format, display.color_output).with_timing(display.show_timing)
    }

    pub fn with_timing(mut self, show_timing: bool) -> Self {
        self.show_timing = show_timing;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render one outcome; `index` is its position in the catalog
    pub fn format_outcome(&self, index: usize, outcome: &Outcome) -> String {
        match self.format {
            OutputFormat::Json => self.json(false).format_outcome(outcome, self.show_timing),
            OutputFormat::JsonPretty => self.json(true).format_outcome(outcome, self.show_timing),
            OutputFormat::Compact => self.format_compact(index, outcome),
            OutputFormat::Shell | OutputFormat::Table => {
                let header = self
                    .colorizer
                    .header(&format!("{}. {}", index + 1, outcome.name));
                let body = match &outcome.error {
                    Some(error) => self.colorizer.error(error),
                    None => self.format_body(&outcome.data),
                };

                if self.show_timing {
                    let timing = self.colorizer.dim(&format!("({}ms)", outcome.elapsed_ms));
                    format!("{header}\n{body}\n{timing}")
                } else {
                    format!("{header}\n{body}")
                }
            }
        }
    }

    fn format_body(&self, data: &OutcomeData) -> String {
        if let OutcomeData::IndexCreated { name } = data {
            return match self.format {
                OutputFormat::Table => self.table().format_rows(vec!["name".into()], vec![vec![name.clone()]]),
                _ => self.shell().format_value(&Bson::String(name.clone())),
            };
        }

        let docs = payload_documents(data);
        match (self.format, data) {
            (OutputFormat::Table, _) => self.table().format_documents(&docs),
            (_, OutcomeData::Documents(_)) => self.shell().format_documents(&docs),
            (_, OutcomeData::None) => self.colorizer.null("null"),
            _ => docs
                .first()
                .map(|d| self.shell().format_document(d))
                .unwrap_or_default(),
        }
    }

    fn format_compact(&self, index: usize, outcome: &Outcome) -> String {
        let summary = match (&outcome.error, &outcome.data) {
            (Some(error), _) => self.colorizer.error(error),
            (None, OutcomeData::Documents(docs)) => format!("{} document(s)", docs.len()),
            (None, OutcomeData::Update { matched, modified }) => {
                format!("matched {matched}, modified {modified}")
            }
            (None, OutcomeData::Delete { deleted }) => format!("deleted {deleted}"),
            (None, OutcomeData::IndexCreated { name }) => format!("index '{name}'"),
            (None, OutcomeData::None) => "ok".to_string(),
        };

        let line = format!("{}. {}: {}", index + 1, outcome.name, summary);
        if self.show_timing {
            format!("{line} {}", self.colorizer.dim(&format!("[{}ms]", outcome.elapsed_ms)))
        } else {
            line
        }
    }

    /// Render the operations of a catalog without running them
    pub fn format_catalog(&self, catalog: &Catalog) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                let ops: Vec<Value> = catalog
                    .iter()
                    .enumerate()
                    .map(|(i, op)| {
                        json!({
                            "index": i + 1,
                            "name": op.name,
                            "kind": op.kind.label(),
                            "arguments": op.kind.arguments(),
                        })
                    })
                    .collect();
                self.json(self.format == OutputFormat::JsonPretty)
                    .render(&Value::Array(ops))
            }
            OutputFormat::Table => {
                let rows = catalog.iter().enumerate().map(|(i, op)| {
                    vec![
                        (i + 1).to_string(),
                        op.name.clone(),
                        op.kind.label().to_string(),
                        op.kind.arguments(),
                    ]
                });
                self.table().format_rows(
                    vec!["#".into(), "name".into(), "kind".into(), "arguments".into()],
                    rows,
                )
            }
            OutputFormat::Shell | OutputFormat::Compact => {
                if catalog.is_empty() {
                    return "(empty catalog)".to_string();
                }
                catalog
                    .iter()
                    .enumerate()
                    .map(|(i, op)| {
                        let line = format!("{:>2}. {}", i + 1, self.colorizer.header(&op.name));
                        if self.format == OutputFormat::Compact {
                            format!("{line} ({})", op.kind.label())
                        } else {
                            format!("{line}\n    {}", self.colorizer.dim(&op.to_string()))
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
    }

    /// One-line summary of a finished run
    pub fn format_summary(&self, report: &RunReport) -> String {
        if self.format.is_json() {
            let value = json!({
                "operations": report.outcomes.len(),
                "succeeded": report.succeeded(),
                "failed": report.failed(),
                "abortedAt": report.aborted_at.map(|i| i + 1),
                "cancelled": report.cancelled,
            });
            return self.json(self.format == OutputFormat::JsonPretty).render(&value);
        }

        let mut line = format!(
            "{} operation(s): {} succeeded, {} failed",
            report.outcomes.len(),
            report.succeeded(),
            report.failed()
        );
        if self.show_timing {
            line.push_str(&format!(" in {}ms", report.total_elapsed_ms()));
        }

        if let Some(index) = report.aborted_at {
            format!("{line}\n{}", self.colorizer.warning(&format!("Run stopped after operation {}", index + 1)))
        } else if report.cancelled {
            format!("{line}\n{}", self.colorizer.warning("Run cancelled"))
        } else if report.failed() == 0 {
            self.colorizer.success(&line)
        } else {
            self.colorizer.warning(&line)
        }
    }

    fn shell(&self) -> ShellFormatter {
        ShellFormatter::new(self.colorizer)
    }

    fn json(&self, pretty: bool) -> JsonFormatter {
        JsonFormatter::new(pretty, self.colorizer.is_enabled(), 2)
    }

    fn table(&self) -> TableFormatter {
        TableFormatter::new(self.colorizer.is_enabled())
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputFormat::Shell, false)
    }
}

/// Payload as documents, with write results in driver acknowledgement shape
fn payload_documents(data: &OutcomeData) -> Vec<Document> {
    match data {
        OutcomeData::Documents(docs) => docs.clone(),
        OutcomeData::Update { matched, modified } => vec![doc! {
            "acknowledged": true,
            "matchedCount": count(*matched),
            "modifiedCount": count(*modified),
        }],
        OutcomeData::Delete { deleted } => vec![doc! {
            "acknowledged": true,
            "deletedCount": count(*deleted),
        }],
        OutcomeData::IndexCreated { name } => vec![doc! { "name": name.clone() }],
        OutcomeData::None => Vec::new(),
    }
}

/// Counts print as plain numbers unless they overflow an int32
fn count(n: u64) -> Bson {
    match i32::try_from(n) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(n as i64),
    }
}
