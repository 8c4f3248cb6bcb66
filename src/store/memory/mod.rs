//! In-memory document store
//!
//! A process-local stand-in for a MongoDB collection, used by the test suite
//! and by `--in-memory` runs. All stores handed out by one [`MemoryConnector`]
//! share the same data, so a test can seed a fixture, run a catalog and then
//! inspect what the catalog left behind.

mod pipeline;
mod query;
mod update;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use tracing::debug;

use super::{Connector, DocumentStore, FindOptions, UpdateSummary};
use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, OperationError, Result};

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: Vec<Document>,
    indexes: Vec<Document>,
}

#[derive(Debug, Default)]
struct Shared {
    collections: Mutex<HashMap<String, MemoryCollection>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    refuse_connections: Mutex<Option<String>>,
}

impl Shared {
    fn collections(&self) -> MutexGuard<'_, HashMap<String, MemoryCollection>> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Connector handing out stores over shared in-memory collections
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl MemoryConnector {
    /// Create an empty connector
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector whose `namespace` already holds `documents`
    pub fn with_documents(namespace: &str, documents: Vec<Document>) -> Self {
        let connector = Self::new();
        connector.seed(namespace, documents);
        connector
    }

    /// Append documents to a namespace, assigning `_id` where missing
    pub fn seed(&self, namespace: &str, documents: Vec<Document>) {
        let mut collections = self.shared.collections();
        let collection = collections.entry(namespace.to_string()).or_default();
        collection
            .documents
            .extend(documents.into_iter().map(with_object_id));
    }

    /// Snapshot of the documents currently stored in a namespace
    pub fn documents(&self, namespace: &str) -> Vec<Document> {
        self.shared
            .collections()
            .get(namespace)
            .map(|c| c.documents.clone())
            .unwrap_or_default()
    }

    /// Make every following `connect` fail with `reason`
    pub fn refuse_connections(&self, reason: &str) {
        *self
            .shared
            .refuse_connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(reason.to_string());
    }

    /// Number of successful connects
    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Number of closes
    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DocumentStore>> {
        let refusal = self
            .shared
            .refuse_connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(reason) = refusal {
            return Err(ConnectionError::ConnectionFailed(reason).into());
        }

        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        debug!("Opened in-memory store for '{}'", config.namespace());

        Ok(Box::new(MemoryStore {
            shared: Arc::clone(&self.shared),
            namespace: config.namespace(),
            closed: false,
        }))
    }
}

/// Store over one in-memory namespace
#[derive(Debug)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    namespace: String,
    closed: bool,
}

impl MemoryStore {
    fn with_collection<T>(&self, f: impl FnOnce(&mut MemoryCollection) -> Result<T>) -> Result<T> {
        if self.closed {
            return Err(ConnectionError::NotConnected.into());
        }
        let mut collections = self.shared.collections();
        f(collections.entry(self.namespace.clone()).or_default())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>> {
        self.with_collection(|c| {
            let mut found = Vec::new();
            for doc in &c.documents {
                if query::matches(doc, &filter)? {
                    found.push(doc.clone());
                }
            }

            if let Some(sort) = &options.sort {
                query::sort_documents(&mut found, sort)?;
            }

            let skip = options.skip.unwrap_or(0) as usize;
            let limit = match options.limit {
                Some(n) if n != 0 => n.unsigned_abs() as usize,
                _ => usize::MAX,
            };
            let page = found.into_iter().skip(skip).take(limit);

            match &options.projection {
                Some(projection) => page.map(|d| pipeline::project(&d, projection)).collect(),
                None => Ok(page.collect()),
            }
        })
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateSummary> {
        self.with_collection(|c| {
            for doc in c.documents.iter_mut() {
                if query::matches(doc, &filter)? {
                    let mut updated = doc.clone();
                    let changed = update::apply_update(&mut updated, &update)?;
                    *doc = updated;
                    return Ok(UpdateSummary {
                        matched: 1,
                        modified: u64::from(changed),
                    });
                }
            }
            Ok(UpdateSummary::default())
        })
    }

    async fn delete_one(&self, filter: Document) -> Result<u64> {
        self.with_collection(|c| {
            let mut position = None;
            for (i, doc) in c.documents.iter().enumerate() {
                if query::matches(doc, &filter)? {
                    position = Some(i);
                    break;
                }
            }
            Ok(position.map_or(0, |i| {
                c.documents.remove(i);
                1
            }))
        })
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        self.with_collection(|c| pipeline::run(c.documents.clone(), &pipeline))
    }

    async fn create_index(&self, keys: Document, options: Option<Document>) -> Result<String> {
        let name = index_name(&keys, options.as_ref())?;
        self.with_collection(|c| {
            ensure_id_index(c);
            if let Some(existing) = c.indexes.iter().find(|ix| ix.get_document("key").ok() == Some(&keys)) {
                let existing_name = existing.get_str("name").unwrap_or_default().to_string();
                if existing_name != name {
                    return Err(OperationError::QueryFailed(format!(
                        "index already exists with a different name: {existing_name}"
                    ))
                    .into());
                }
                return Ok(existing_name);
            }

            if c.indexes.iter().any(|ix| ix.get_str("name").ok() == Some(name.as_str())) {
                return Err(OperationError::QueryFailed(format!(
                    "an index named '{name}' already exists with different keys"
                ))
                .into());
            }

            let mut descriptor = doc! { "v": 2, "key": keys.clone(), "name": name.clone() };
            if let Some(options) = options {
                for (k, v) in options.into_iter().filter(|(k, _)| k != "name") {
                    descriptor.insert(k, v);
                }
            }
            c.indexes.push(descriptor);
            Ok(name)
        })
    }

    async fn list_indexes(&self) -> Result<Vec<Document>> {
        self.with_collection(|c| {
            ensure_id_index(c);
            Ok(c.indexes.clone())
        })
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64> {
        self.with_collection(|c| {
            let count = documents.len() as u64;
            c.documents.extend(documents.into_iter().map(with_object_id));
            Ok(count)
        })
    }

    async fn delete_many(&self, filter: Document) -> Result<u64> {
        self.with_collection(|c| {
            let mut keep = Vec::with_capacity(c.documents.len());
            for doc in &c.documents {
                keep.push(!query::matches(doc, &filter)?);
            }
            let removed = keep.iter().filter(|k| !**k).count() as u64;
            let mut flags = keep.into_iter();
            c.documents.retain(|_| flags.next().unwrap_or(true));
            Ok(removed)
        })
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(ConnectionError::NotConnected.into());
        }
        self.closed = true;
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        debug!("Closed in-memory store for '{}'", self.namespace);
        Ok(())
    }
}

fn ensure_id_index(collection: &mut MemoryCollection) {
    if collection.indexes.is_empty() {
        collection
            .indexes
            .push(doc! { "v": 2, "key": { "_id": 1 }, "name": "_id_" });
    }
}

fn with_object_id(mut doc: Document) -> Document {
    if !doc.contains_key("_id") {
        let mut with_id = doc! { "_id": ObjectId::new() };
        with_id.extend(std::mem::take(&mut doc));
        return with_id;
    }
    doc
}

/// Server-style index name such as `author_1_published_year_-1`
fn index_name(keys: &Document, options: Option<&Document>) -> Result<String> {
    if let Some(name) = options.and_then(|o| o.get_str("name").ok()) {
        return Ok(name.to_string());
    }

    if keys.is_empty() {
        return Err(OperationError::InvalidParameters("index key spec is empty".to_string()).into());
    }

    let parts = keys
        .iter()
        .map(|(field, direction)| -> Result<String> {
            let dir = match direction {
                Bson::Int32(n) => n.to_string(),
                Bson::Int64(n) => n.to_string(),
                Bson::Double(f) if f.fract() == 0.0 => format!("{}", *f as i64),
                Bson::String(s) => s.clone(),
                other => {
                    return Err(OperationError::InvalidParameters(format!(
                        "invalid index direction for '{field}': {other}"
                    ))
                    .into());
                }
            };
            Ok(format!("{field}_{dir}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(parts.join("_"))
}
