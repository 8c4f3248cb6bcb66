//! mongo-catalog
//!
//! Runs a named catalog of MongoDB operations (finds, updates, deletes,
//! aggregations, index builds) against one collection over a single
//! connection, printing one result per operation.
//!
//! # Usage
//!
//! ```bash
//! # Built-in bookstore catalog against a local server
//! mongo-catalog mongodb://localhost:27017
//!
//! # Load sample data, then run only two operations as JSON
//! mongo-catalog seed --reset
//! mongo-catalog --only "All Fiction books" --only "Current indexes" --format json
//! ```

use mongo_catalog::cli::CliInterface;
use mongo_catalog::error::{CatalogError, Result};
use tokio_util::sync::CancellationToken;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

/// Parse arguments, initialize logging and run the selected subcommand
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("Interrupted, finishing current operation...");
                ctrl_c_token.cancel();
            }
            Err(err) => {
                eprintln!("Failed to listen for Ctrl+C: {}", err);
            }
        }
    });

    let result = cli.execute(cancel_token).await;
    ctrl_c_handle.abort();
    result
}

/// Invalid input exits with 2, everything else with 1
fn exit_code(error: &CatalogError) -> i32 {
    match error {
        CatalogError::Argument(_) => 2,
        _ => 1,
    }
}

/// Initialize logging based on configuration and verbosity flags
fn initialize_logging(cli: &CliInterface) {
    let logging = &cli.config().logging;

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(logging.level.to_tracing_level())
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
