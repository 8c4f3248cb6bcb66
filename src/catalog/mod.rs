//! Operation catalogs
//!
//! A catalog is an ordered list of named operations against one collection.
//! The built-in [`Catalog::bookstore`] reproduces the bookstore walkthrough:
//! three reads, an update, a delete, three aggregations and the index builds.
//! Custom catalogs load from JSON or TOML files:
//!
//! ```json
//! {
//!   "operations": [
//!     { "name": "Fiction", "kind": "find", "filter": { "genre": "Fiction" } },
//!     { "name": "Indexes", "kind": "listIndexes" }
//!   ]
//! }
//! ```

use std::fmt;
use std::path::Path;

use mongodb::bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};

use crate::error::{ArgumentError, Result};
use crate::store::FindOptions;

/// One named catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Label used when reporting the outcome
    pub name: String,

    /// What to run and with which arguments
    #[serde(flatten)]
    pub kind: OperationKind,
}

/// Operation kinds with their arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OperationKind {
    Find {
        #[serde(default)]
        filter: Document,
        #[serde(flatten)]
        options: FindOptions,
    },
    UpdateOne {
        filter: Document,
        update: Document,
    },
    DeleteOne {
        filter: Document,
    },
    Aggregate {
        pipeline: Vec<Document>,
    },
    CreateIndex {
        keys: Document,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<Document>,
    },
    ListIndexes,
}

impl OperationKind {
    /// Driver-style method name, e.g. `updateOne`
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Find { .. } => "find",
            OperationKind::UpdateOne { .. } => "updateOne",
            OperationKind::DeleteOne { .. } => "deleteOne",
            OperationKind::Aggregate { .. } => "aggregate",
            OperationKind::CreateIndex { .. } => "createIndex",
            OperationKind::ListIndexes => "listIndexes",
        }
    }

    /// Whether the operation changes data or indexes
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            OperationKind::UpdateOne { .. }
                | OperationKind::DeleteOne { .. }
                | OperationKind::CreateIndex { .. }
        )
    }

    /// Arguments rendered as relaxed extended JSON
    pub fn arguments(&self) -> String {
        let args: Vec<Bson> = match self {
            OperationKind::Find { filter, options } => {
                let mut args = vec![Bson::Document(filter.clone())];
                if !options.is_empty() {
                    args.push(match bson::to_document(options) {
                        Ok(options) => Bson::Document(options),
                        Err(e) => Bson::String(format!("<invalid options: {e}>")),
                    });
                }
                args
            }
            OperationKind::UpdateOne { filter, update } => vec![
                Bson::Document(filter.clone()),
                Bson::Document(update.clone()),
            ],
            OperationKind::DeleteOne { filter } => vec![Bson::Document(filter.clone())],
            OperationKind::Aggregate { pipeline } => vec![Bson::Array(
                pipeline.iter().cloned().map(Bson::Document).collect(),
            )],
            OperationKind::CreateIndex { keys, options } => {
                let mut args = vec![Bson::Document(keys.clone())];
                if let Some(options) = options {
                    args.push(Bson::Document(options.clone()));
                }
                args
            }
            OperationKind::ListIndexes => Vec::new(),
        };

        args.into_iter()
            .map(|arg| arg.into_relaxed_extjson().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Operation {
    /// Create a named operation
    pub fn new(name: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Read query
    pub fn find(name: impl Into<String>, filter: Document) -> Self {
        Self::new(
            name,
            OperationKind::Find {
                filter,
                options: FindOptions::default(),
            },
        )
    }

    /// Single-document update
    pub fn update_one(name: impl Into<String>, filter: Document, update: Document) -> Self {
        Self::new(name, OperationKind::UpdateOne { filter, update })
    }

    /// Single-document delete
    pub fn delete_one(name: impl Into<String>, filter: Document) -> Self {
        Self::new(name, OperationKind::DeleteOne { filter })
    }

    /// Aggregation pipeline
    pub fn aggregate(name: impl Into<String>, pipeline: Vec<Document>) -> Self {
        Self::new(name, OperationKind::Aggregate { pipeline })
    }

    /// Index build
    pub fn create_index(name: impl Into<String>, keys: Document) -> Self {
        Self::new(name, OperationKind::CreateIndex { keys, options: None })
    }

    /// Index listing
    pub fn list_indexes(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::ListIndexes)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.label(), self.kind.arguments())
    }
}

/// Ordered list of operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    operations: Vec<Operation>,
}

impl Catalog {
    /// Create a catalog from operations, keeping their order
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    /// The bookstore walkthrough
    pub fn bookstore() -> Self {
        Self::new(vec![
            Operation::find("All Fiction books", doc! { "genre": "Fiction" }),
            Operation::find(
                "Books published after 1950",
                doc! { "published_year": { "$gt": 1950 } },
            ),
            Operation::find("Books by George Orwell", doc! { "author": "George Orwell" }),
            Operation::update_one(
                "Update the price of '1984'",
                doc! { "title": "1984" },
                doc! { "$set": { "price": 13.99 } },
            ),
            Operation::delete_one("Delete 'Moby Dick'", doc! { "title": "Moby Dick" }),
            Operation::aggregate(
                "Average price per genre",
                vec![
                    doc! { "$group": { "_id": "$genre", "avgPrice": { "$avg": "$price" } } },
                    doc! { "$sort": { "avgPrice": -1 } },
                ],
            ),
            Operation::aggregate(
                "Author with the most books",
                vec![
                    doc! { "$group": { "_id": "$author", "count": { "$sum": 1 } } },
                    doc! { "$sort": { "count": -1 } },
                    doc! { "$limit": 1 },
                ],
            ),
            Operation::aggregate(
                "Books grouped by decade",
                vec![
                    doc! {
                        "$project": {
                            "decade": {
                                "$multiply": [
                                    { "$floor": { "$divide": ["$published_year", 10] } },
                                    10
                                ]
                            }
                        }
                    },
                    doc! { "$group": { "_id": "$decade", "count": { "$sum": 1 } } },
                    doc! { "$sort": { "_id": 1 } },
                ],
            ),
            Operation::create_index("Index on title", doc! { "title": 1 }),
            Operation::create_index(
                "Index on author and published_year",
                doc! { "author": 1, "published_year": -1 },
            ),
            Operation::list_indexes("Current indexes"),
        ])
    }

    /// Load a catalog from a `.json` or `.toml` file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ArgumentError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => Err(ArgumentError::InvalidFormat(format!(
                "catalog file '{}' must end in .json or .toml",
                path.display()
            ))
            .into()),
        }
    }

    /// Parse a JSON catalog
    pub fn from_json_str(content: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(content)
            .map_err(|e| ArgumentError::InvalidFormat(format!("catalog: {e}")))?;
        catalog.check_names()?;
        Ok(catalog)
    }

    /// Parse a TOML catalog (`[[operations]]` tables)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(content)
            .map_err(|e| ArgumentError::InvalidFormat(format!("catalog: {e}")))?;
        catalog.check_names()?;
        Ok(catalog)
    }

    fn check_names(&self) -> Result<()> {
        if let Some(op) = self.operations.iter().find(|op| op.name.trim().is_empty()) {
            return Err(ArgumentError::MissingField(format!(
                "name of {} operation",
                op.kind.label()
            ))
            .into());
        }
        Ok(())
    }

    /// Keep only the named operations, in catalog order
    pub fn select(self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }

        if let Some(unknown) = names
            .iter()
            .find(|name| !self.operations.iter().any(|op| &op.name == *name))
        {
            return Err(ArgumentError::UnknownOperation(unknown.clone()).into());
        }

        Ok(Self::new(
            self.operations
                .into_iter()
                .filter(|op| names.contains(&op.name))
                .collect(),
        ))
    }

    /// Operations in execution order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}
