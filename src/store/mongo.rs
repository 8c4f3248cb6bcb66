//! MongoDB-backed store
//!
//! Thin adapter from [`DocumentStore`] onto a driver `Collection<Document>`.
//! Driver errors are propagated unchanged so the outcome carries the server's
//! code and message.

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{self, Document};
use mongodb::{Collection, IndexModel};
use tracing::{debug, info};

use super::{Connector, DocumentStore, FindOptions, UpdateSummary};
use crate::config::ConnectionConfig;
use crate::connection::ConnectionManager;
use crate::error::{ConnectionError, OperationError, Result};

/// Connector opening one MongoDB client per store
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoConnector;

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DocumentStore>> {
        let store = MongoStore::connect(config.clone()).await?;
        Ok(Box::new(store))
    }
}

/// Store over one MongoDB collection
pub struct MongoStore {
    /// Connection owning the client
    manager: ConnectionManager,

    /// Collection handle; `None` once closed
    collection: Option<Collection<Document>>,
}

impl MongoStore {
    /// Connect and bind the configured collection
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        let mut manager = ConnectionManager::new(config);
        manager.connect().await?;

        let config = manager.config();
        let collection = manager
            .get_database(&config.database)?
            .collection::<Document>(&config.collection);

        if let Ok(health) = manager.health_check().await {
            debug!("Ping round trip: {}ms", health.response_time_ms);
        }

        match manager.server_version() {
            Some(version) => info!("Connected to MongoDB {} ({})", version, config.namespace()),
            None => info!("Connected to MongoDB ({})", config.namespace()),
        }

        Ok(Self {
            manager,
            collection: Some(collection),
        })
    }

    /// Server version reported at connect time
    pub fn server_version(&self) -> Option<&str> {
        self.manager.server_version()
    }

    fn collection(&self) -> Result<&Collection<Document>> {
        self.collection
            .as_ref()
            .ok_or_else(|| ConnectionError::NotConnected.into())
    }

    /// Parse index options from a document
    fn parse_index_options(
        options_doc: Option<Document>,
    ) -> Result<Option<mongodb::options::IndexOptions>> {
        match options_doc {
            Some(opts) => {
                let index_opts = bson::from_document(opts).map_err(|e| {
                    OperationError::InvalidParameters(format!("Invalid index options: {}", e))
                })?;
                Ok(Some(index_opts))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn namespace(&self) -> String {
        self.manager.config().namespace()
    }

    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>> {
        debug!("find on '{}' with filter: {:?}", self.namespace(), filter);

        let find_options = mongodb::options::FindOptions::builder()
            .sort(options.sort)
            .projection(options.projection)
            .skip(options.skip)
            .limit(options.limit)
            .build();

        let cursor = self
            .collection()?
            .find(filter)
            .with_options(find_options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateSummary> {
        debug!("updateOne on '{}' with filter: {:?}", self.namespace(), filter);

        let result = self.collection()?.update_one(filter, update).await?;
        Ok(UpdateSummary {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, filter: Document) -> Result<u64> {
        debug!("deleteOne on '{}' with filter: {:?}", self.namespace(), filter);

        let result = self.collection()?.delete_one(filter).await?;
        Ok(result.deleted_count)
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        debug!(
            "aggregate on '{}' with {} pipeline stages",
            self.namespace(),
            pipeline.len()
        );

        let cursor = self.collection()?.aggregate(pipeline).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn create_index(&self, keys: Document, options: Option<Document>) -> Result<String> {
        debug!("createIndex on '{}' with keys: {:?}", self.namespace(), keys);

        let index_model = IndexModel::builder()
            .keys(keys)
            .options(Self::parse_index_options(options)?)
            .build();

        let result = self.collection()?.create_index(index_model).await?;
        Ok(result.index_name)
    }

    async fn list_indexes(&self) -> Result<Vec<Document>> {
        let cursor = self.collection()?.list_indexes().await?;
        let models: Vec<IndexModel> = cursor.try_collect().await?;

        models
            .iter()
            .map(|index| -> Result<Document> {
                let doc = bson::to_document(index).map_err(|e| {
                    OperationError::QueryFailed(format!(
                        "Failed to convert index to document: {}",
                        e
                    ))
                })?;
                Ok(doc)
            })
            .collect()
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64> {
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self.collection()?.insert_many(documents).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn delete_many(&self, filter: Document) -> Result<u64> {
        let result = self.collection()?.delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    async fn close(&mut self) -> Result<()> {
        self.collection.take().ok_or(ConnectionError::NotConnected)?;
        self.manager.disconnect().await
    }
}
