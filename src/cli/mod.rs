//! Command-line interface
//!
//! This module handles:
//! - Argument parsing with clap
//! - Layering configuration (CLI > environment > file > defaults)
//! - Dispatching the `run`, `list`, `seed`, `config`, `version` and
//!   `completion` subcommands

mod completion;
mod reporter;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::config::{Config, FaultPolicy, LogLevel, OutputFormat, sanitize_uri};
use crate::error::{ArgumentError, Result};
use crate::formatter::Formatter;
use crate::runner::OperationRunner;
use crate::seed::{sample_books, seed};
use crate::store::{Connector, MemoryConnector, MongoConnector};

pub use completion::generate_completion;
pub use reporter::ConsoleReporter;

/// Run a catalog of MongoDB operations against one collection
#[derive(Parser, Debug)]
#[command(
    name = "mongo-catalog",
    version,
    about = "Run a named catalog of MongoDB operations against one collection",
    long_about = "Connects once, runs every catalog operation in order (finds, updates, deletes,
aggregations, index builds), prints one result per operation and closes the connection.
Without a catalog file the built-in bookstore catalog is used."
)]
pub struct CliArgs {
    /// MongoDB connection URI
    ///
    /// Format: mongodb://[username:password@]host[:port][/database][?options]
    #[arg(value_name = "URI")]
    pub uri: Option<String>,

    /// Database name
    #[arg(long, value_name = "NAME")]
    pub database: Option<String>,

    /// Collection name
    #[arg(long, value_name = "NAME")]
    pub collection: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Catalog file (.json or .toml) instead of the built-in bookstore catalog
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Only run the named operation (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Stop at the first failed operation
    #[arg(long)]
    pub fail_fast: bool,

    /// Per-operation deadline in seconds
    #[arg(long, value_name = "SECONDS")]
    pub operation_timeout: Option<u64>,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Use an in-process store preloaded with the sample books
    #[arg(long)]
    pub in_memory: bool,

    /// Output format (shell, json, json-pretty, table, compact)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the catalog (default)
    Run,

    /// List catalog operations without running them
    List,

    /// Insert the sample bookstore dataset
    Seed {
        /// Delete existing documents first
        #[arg(long)]
        reset: bool,
    },

    /// Show or validate configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration
        #[arg(long)]
        validate: bool,
    },

    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },
}

/// CLI interface handler
pub struct CliInterface {
    args: CliArgs,
    config: Config,
}

impl CliInterface {
    /// Parse process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse(), |key| std::env::var(key).ok())
    }

    /// Build from parsed arguments, reading environment through `env`
    pub fn from_args<F>(args: CliArgs, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        config.apply_env_with(env);
        Self::apply_args_to_config(&mut config, &args)?;
        Ok(Self { args, config })
    }

    /// Effective configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Selected subcommand, `run` when none is given
    pub fn command(&self) -> Commands {
        self.args.command.clone().unwrap_or(Commands::Run)
    }

    fn apply_args_to_config(config: &mut Config, args: &CliArgs) -> Result<()> {
        Self::apply_connection_args(config, args);
        Self::apply_runner_args(config, args);
        Self::apply_display_args(config, args)?;
        Self::apply_logging_args(config, args);
        Ok(())
    }

    fn apply_connection_args(config: &mut Config, args: &CliArgs) {
        if let Some(uri) = &args.uri {
            config.connection.uri = uri.clone();
        }
        if let Some(database) = &args.database {
            config.connection.database = database.clone();
        }
        if let Some(collection) = &args.collection {
            config.connection.collection = collection.clone();
        }
        if let Some(timeout) = args.timeout {
            config.connection.timeout = timeout;
        }
    }

    fn apply_runner_args(config: &mut Config, args: &CliArgs) {
        if args.fail_fast {
            config.runner.fault_policy = FaultPolicy::Abort;
        }
        if args.operation_timeout.is_some() {
            config.runner.operation_timeout = args.operation_timeout;
        }
    }

    fn apply_display_args(config: &mut Config, args: &CliArgs) -> Result<()> {
        if let Some(name) = &args.format {
            config.display.format =
                OutputFormat::parse(name).ok_or_else(|| ArgumentError::InvalidValue {
                    field: "format".to_string(),
                    value: name.clone(),
                })?;
        }

        if args.no_color {
            config.display.color_output = false;
        }
        Ok(())
    }

    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Catalog selected by `--catalog` and `--only`
    pub fn catalog(&self) -> Result<Catalog> {
        let catalog = match &self.args.catalog {
            Some(path) => Catalog::from_path(path)?,
            None => Catalog::bookstore(),
        };
        catalog.select(&self.args.only)
    }

    fn formatter(&self) -> Formatter {
        Formatter::from_config(&self.config.display)
    }

    fn connector(&self) -> Box<dyn Connector> {
        if self.args.in_memory {
            Box::new(MemoryConnector::with_documents(
                &self.config.connection.namespace(),
                sample_books(),
            ))
        } else {
            Box::new(MongoConnector)
        }
    }

    /// Execute the selected subcommand
    ///
    /// # Arguments
    /// * `cancel_token` - Interrupts a running catalog (e.g. on Ctrl+C)
    pub async fn execute(&self, cancel_token: CancellationToken) -> Result<()> {
        match self.command() {
            Commands::Run => self.run_catalog(cancel_token).await,
            Commands::List => {
                println!("{}", self.formatter().format_catalog(&self.catalog()?));
                Ok(())
            }
            Commands::Seed { reset } => self.seed(reset, cancel_token).await,
            Commands::Config { show, validate } => self.handle_config_command(show, validate),
            Commands::Version => {
                self.show_version();
                Ok(())
            }
            Commands::Completion { shell } => {
                print!("{}", generate_completion(&shell)?);
                Ok(())
            }
        }
    }

    async fn run_catalog(&self, cancel_token: CancellationToken) -> Result<()> {
        self.config.validate()?;
        let catalog = self.catalog()?;

        if !self.args.quiet {
            eprintln!(
                "Running {} operation(s) against {} on {}",
                catalog.len(),
                self.config.connection.namespace(),
                sanitize_uri(&self.config.connection.uri)
            );
        }

        let runner = OperationRunner::boxed(self.connector())
            .with_config(&self.config.runner)
            .with_cancellation(cancel_token);
        let mut reporter = ConsoleReporter::new(self.formatter());

        let report = runner
            .run(&self.config.connection, &catalog, &mut reporter)
            .await?;

        if !self.args.quiet {
            eprintln!("{}", reporter.formatter().format_summary(&report));
        }
        Ok(())
    }

    async fn seed(&self, reset: bool, cancel_token: CancellationToken) -> Result<()> {
        if self.args.in_memory {
            return Err(ArgumentError::Conflict(
                "--in-memory cannot be used with seed, the collection is discarded on exit".into(),
            )
            .into());
        }

        let summary = seed(
            &MongoConnector,
            &self.config.connection,
            reset,
            &cancel_token,
        )
        .await?;
        if reset {
            println!("Removed {} document(s)", summary.removed);
        }
        println!(
            "Inserted {} book(s) into {}",
            summary.inserted,
            self.config.connection.namespace()
        );
        Ok(())
    }

    fn show_version(&self) {
        println!("mongo-catalog version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            println!("Validating configuration: {}", self.config_path().display());
            match self.config.validate() {
                Ok(()) => println!("✅ Configuration is valid"),
                Err(e) => {
                    println!("❌ Configuration validation failed: {}", e);
                    return Err(e);
                }
            }
        }

        if show || !validate {
            println!("Configuration file: {}", self.config_path().display());
            println!();
            println!("{}", self.config.to_toml()?);
        }

        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }
}
