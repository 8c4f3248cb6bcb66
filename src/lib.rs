//! mongo-catalog library
//!
//! Core of the `mongo-catalog` binary: an ordered catalog of named MongoDB
//! operations executed over one connection, with one outcome per operation.
//!
//! # Modules
//!
//! - `catalog`: Operation model, built-in bookstore catalog, catalog files
//! - `runner`: Executes a catalog and produces outcomes
//! - `store`: Data-access traits with MongoDB and in-memory implementations
//! - `connection`: MongoDB client setup, retries and health checks
//! - `config`: Configuration management
//! - `formatter`: Output formatting and display
//! - `seed`: Sample bookstore dataset
//! - `cli`: Command-line interface
//! - `error`: Error types and handling
//!
//! # Example
//!
//! ```no_run
//! use mongo_catalog::{Catalog, OperationRunner, config::Config, store::MongoConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let runner = OperationRunner::new(MongoConnector);
//!
//!     let report = runner
//!         .run(&config.connection, &Catalog::bookstore(), &mut |index: usize, outcome: &mongo_catalog::Outcome| {
//!             println!("{}. {} -> {}", index + 1, outcome.name, outcome.success);
//!         })
//!         .await?;
//!
//!     println!("{} failed", report.failed());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod formatter;
pub mod runner;
pub mod seed;
pub mod store;

// Re-export commonly used types
pub use catalog::{Catalog, Operation, OperationKind};
pub use config::Config;
pub use connection::ConnectionManager;
pub use error::{CatalogError, Result};
pub use formatter::Formatter;
pub use runner::{OperationRunner, Outcome, OutcomeData, Reporter, RunReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
