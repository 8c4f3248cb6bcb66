//! Connection management for MongoDB
//!
//! This module provides connection management functionality including:
//! - Client option construction from the URI and connection config
//! - Connection establishment with retries and a ping health check
//! - Server version discovery
//! - Orderly shutdown

use mongodb::bson::doc;
use mongodb::{Client, Database, options::ClientOptions};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::{ConnectionConfig, sanitize_uri};
use crate::error::{ConnectionError, ErrorInfo, Result};

/// Delay before the second connection attempt; doubles after each failure
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// MongoDB connection manager
///
/// Owns one client for the lifetime of a run.
pub struct ConnectionManager {
    /// MongoDB client instance
    client: Option<Client>,

    /// Connection configuration
    config: ConnectionConfig,

    /// Server version reported by `buildInfo`
    server_version: Option<String>,
}

/// Health check result
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the ping succeeded
    pub is_healthy: bool,

    /// Round-trip time in milliseconds
    pub response_time_ms: u64,
}

impl ConnectionManager {
    /// Create a new connection manager
    ///
    /// # Arguments
    /// * `config` - Connection configuration
    ///
    /// # Returns
    /// * `Self` - New, disconnected manager
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            client: None,
            config,
            server_version: None,
        }
    }

    /// Establish connection to MongoDB
    ///
    /// # Returns
    /// * `Result<()>` - Success or connection error
    pub async fn connect(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }

        let options = Self::parse_uri(&self.config.uri).await?;
        let options = self.configure(options);

        let client = self.connect_with_retry(options).await?;
        self.server_version = Self::fetch_server_version(&client).await;
        self.client = Some(client);
        Ok(())
    }

    /// Disconnect from MongoDB
    ///
    /// Shuts the client down and waits for pooled connections to close.
    pub async fn disconnect(&mut self) -> Result<()> {
        let client = self.client.take().ok_or(ConnectionError::NotConnected)?;
        client.shutdown().await;
        debug!("Client shut down");
        Ok(())
    }

    /// Ping the server and time the round trip
    pub async fn health_check(&self) -> Result<HealthStatus> {
        let client = self.get_client()?;
        let started = Instant::now();
        let is_healthy = Self::ping(client).await.is_ok();
        Ok(HealthStatus {
            is_healthy,
            response_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Get a database handle
    pub fn get_database(&self, name: &str) -> Result<Database> {
        Ok(self.get_client()?.database(name))
    }

    /// Get the MongoDB client
    pub fn get_client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ConnectionError::NotConnected.into())
    }

    /// Server version, when `buildInfo` succeeded
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Parse connection URI and create client options
    async fn parse_uri(uri: &str) -> Result<ClientOptions> {
        ClientOptions::parse(uri).await.map_err(|e| {
            ConnectionError::InvalidUri(format!(
                "{} ({})",
                sanitize_uri(uri),
                ErrorInfo::from_mongodb_error(&e).summary()
            ))
            .into()
        })
    }

    /// Apply timeouts, pool sizes and app name from the configuration
    fn configure(&self, mut options: ClientOptions) -> ClientOptions {
        let timeout = self.config.connect_timeout();
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.max_pool_size = Some(self.config.max_pool_size);
        options.min_pool_size = Some(self.config.min_pool_size);
        if options.app_name.is_none() {
            options.app_name = Some(self.config.app_name.clone());
        }
        options
    }

    /// Attempt connection with retries
    async fn connect_with_retry(&self, options: ClientOptions) -> Result<Client> {
        let attempts = self.config.retry_attempts.max(1);
        let mut backoff = RETRY_BACKOFF;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let client = Client::with_options(options.clone()).map_err(|e| {
                ConnectionError::ConnectionFailed(ErrorInfo::from_mongodb_error(&e).summary())
            })?;

            match Self::ping(&client).await {
                Ok(()) => {
                    debug!("Ping succeeded on attempt {}", attempt);
                    return Ok(client);
                }
                Err(e) => {
                    last_error = e;
                    client.shutdown().await;
                    if attempt < attempts {
                        warn!(
                            "Connection attempt {}/{} failed: {}; retrying in {:?}",
                            attempt, attempts, last_error, backoff
                        );
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        Err(ConnectionError::ConnectionFailed(last_error).into())
    }

    /// Verify connection is alive by sending a ping
    async fn ping(client: &Client) -> std::result::Result<(), String> {
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| ErrorInfo::from_mongodb_error(&e).summary())
    }

    /// Read the server version from `buildInfo`
    async fn fetch_server_version(client: &Client) -> Option<String> {
        match client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await
        {
            Ok(info) => info.get_str("version").ok().map(str::to_string),
            Err(e) => {
                debug!("buildInfo failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manager_is_disconnected() {
        let manager = ConnectionManager::new(ConnectionConfig::default());
        assert!(manager.get_client().is_err());
        assert!(manager.server_version().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_without_connect() {
        let mut manager = ConnectionManager::new(ConnectionConfig::default());
        assert!(manager.disconnect().await.is_err());
    }

    #[tokio::test]
    async fn test_configure_applies_connection_settings() {
        let config = ConnectionConfig {
            timeout: 3,
            max_pool_size: 4,
            ..ConnectionConfig::default()
        };
        let manager = ConnectionManager::new(config);
        let options = ConnectionManager::parse_uri("mongodb://localhost:27017")
            .await
            .unwrap();
        let options = manager.configure(options);

        assert_eq!(options.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.max_pool_size, Some(4));
        assert_eq!(options.app_name.as_deref(), Some("mongo-catalog"));
    }

    #[tokio::test]
    async fn test_invalid_uri_is_connection_error() {
        let err = ConnectionManager::parse_uri("mongodb://localhost:notaport")
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("Connection error: Invalid connection URI"));
    }

    /// Log sink shared between the subscriber and the assertions
    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_connect_leaves_connecting_line_to_caller() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut manager = ConnectionManager::new(ConnectionConfig {
            uri: "mongodb://localhost:notaport".into(),
            ..ConnectionConfig::default()
        });
        assert!(manager.connect().await.is_err());

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(!output.contains("Connecting to"), "{output}");
    }
}
