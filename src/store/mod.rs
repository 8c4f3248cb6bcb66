//! Data-access layer
//!
//! The runner only ever talks to a collection through [`DocumentStore`], and
//! only ever obtains one through a [`Connector`]. Two implementations ship:
//! - [`MongoConnector`]: a real MongoDB deployment via the official driver
//! - [`MemoryConnector`]: an in-process fixture for tests and dry runs

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::Document;
use serde::{Deserialize, Serialize};

use crate::config::ConnectionConfig;
use crate::error::Result;

pub use memory::{MemoryConnector, MemoryStore};
pub use mongo::{MongoConnector, MongoStore};

/// Optional modifiers for a find query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOptions {
    /// Sort specification, e.g. `{ price: -1 }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Document>,

    /// Projection specification, e.g. `{ title: 1, _id: 0 }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Document>,

    /// Number of documents to skip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,

    /// Maximum number of documents to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

impl FindOptions {
    /// Whether no modifier is set
    pub fn is_empty(&self) -> bool {
        self == &FindOptions::default()
    }
}

/// Counts reported by an update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Documents matched by the filter
    pub matched: u64,

    /// Documents actually changed
    pub modified: u64,
}

/// Capabilities of one connected collection
///
/// A store is owned by exactly one run. Once [`DocumentStore::close`] has
/// returned, every further call fails with `ConnectionError::NotConnected`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `database.collection` this store targets
    fn namespace(&self) -> String;

    /// Return all documents matching `filter`
    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>>;

    /// Update the first document matching `filter`
    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateSummary>;

    /// Delete the first document matching `filter`, returning the deleted count
    async fn delete_one(&self, filter: Document) -> Result<u64>;

    /// Run an aggregation pipeline
    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>>;

    /// Create an index, returning its name
    async fn create_index(&self, keys: Document, options: Option<Document>) -> Result<String>;

    /// Describe every index on the collection
    async fn list_indexes(&self) -> Result<Vec<Document>>;

    /// Insert documents, returning the inserted count
    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64>;

    /// Delete all documents matching `filter`, returning the deleted count
    async fn delete_many(&self, filter: Document) -> Result<u64>;

    /// Release the underlying connection
    async fn close(&mut self) -> Result<()>;
}

/// Opens stores for a connection configuration
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and return a store for the configured collection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DocumentStore>>;
}
