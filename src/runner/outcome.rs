//! Per-operation result records
//!
//! - [`Outcome`]: what happened to one catalog entry
//! - [`OutcomeData`]: the payload a successful operation produced
//! - [`RunReport`]: every outcome of one run, plus how the run ended

use mongodb::bson::Document;

use crate::catalog::Operation;

/// Payload returned by a successful operation
#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeData {
    /// Query, aggregation or index listing results
    Documents(Vec<Document>),

    /// Update result
    Update { matched: u64, modified: u64 },

    /// Delete result
    Delete { deleted: u64 },

    /// Name of the created index
    IndexCreated { name: String },

    /// No data
    None,
}

impl OutcomeData {
    /// Documents returned, or 0 for count-style payloads
    pub fn document_count(&self) -> usize {
        match self {
            OutcomeData::Documents(docs) => docs.len(),
            _ => 0,
        }
    }

    /// Documents changed by a write, if this is a write payload
    pub fn affected(&self) -> Option<u64> {
        match self {
            OutcomeData::Update { modified, .. } => Some(*modified),
            OutcomeData::Delete { deleted } => Some(*deleted),
            _ => None,
        }
    }
}

/// Result of one catalog operation
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Operation name from the catalog
    pub name: String,

    /// Operation kind, e.g. `aggregate`
    pub kind: String,

    /// Success status
    pub success: bool,

    /// Payload (always [`OutcomeData::None`] on failure)
    pub data: OutcomeData,

    /// Error description if failed
    pub error: Option<String>,

    /// Wall-clock time spent on the operation
    pub elapsed_ms: u64,
}

impl Outcome {
    /// Create a successful outcome
    pub fn success(operation: &Operation, data: OutcomeData, elapsed_ms: u64) -> Self {
        Self {
            name: operation.name.clone(),
            kind: operation.kind.label().to_string(),
            success: true,
            data,
            error: None,
            elapsed_ms,
        }
    }

    /// Create a failed outcome
    pub fn failure(operation: &Operation, error: String, elapsed_ms: u64) -> Self {
        Self {
            name: operation.name.clone(),
            kind: operation.kind.label().to_string(),
            success: false,
            data: OutcomeData::None,
            error: Some(error),
            elapsed_ms,
        }
    }

    /// Documents carried by the payload (empty for other payloads)
    pub fn documents(&self) -> &[Document] {
        match &self.data {
            OutcomeData::Documents(docs) => docs,
            _ => &[],
        }
    }
}

/// Everything one run produced
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Outcomes in catalog order
    pub outcomes: Vec<Outcome>,

    /// Index of the failed operation that stopped an aborting run
    pub aborted_at: Option<usize>,

    /// Whether the run was interrupted
    pub cancelled: bool,
}

impl RunReport {
    /// Number of successful outcomes
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    /// Number of failed outcomes
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Whether every operation ran
    pub fn is_complete(&self) -> bool {
        self.aborted_at.is_none() && !self.cancelled
    }

    /// Total time spent in operations
    pub fn total_elapsed_ms(&self) -> u64 {
        self.outcomes.iter().map(|o| o.elapsed_ms).sum()
    }
}
