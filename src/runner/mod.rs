//! Catalog execution
//!
//! [`OperationRunner::run`] opens one store through its [`Connector`], runs
//! every catalog operation in order, hands each [`Outcome`] to a [`Reporter`]
//! and closes the store exactly once, whatever the operations did.

mod outcome;

#[cfg(test)]
mod tests;

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Operation, OperationKind};
use crate::config::{ConnectionConfig, FaultPolicy, RunnerConfig, sanitize_uri};
use crate::error::{CatalogError, OperationError, Result};
use crate::store::{Connector, DocumentStore};

pub use outcome::{Outcome, OutcomeData, RunReport};

/// Receives each outcome as soon as it is produced
pub trait Reporter: Send {
    /// Called once per executed operation, in catalog order
    fn report(&mut self, index: usize, outcome: &Outcome);
}

impl<F> Reporter for F
where
    F: FnMut(usize, &Outcome) + Send,
{
    fn report(&mut self, index: usize, outcome: &Outcome) {
        self(index, outcome)
    }
}

/// Runs catalogs against stores obtained from a connector
pub struct OperationRunner {
    connector: Box<dyn Connector>,
    fault_policy: FaultPolicy,
    operation_timeout: Option<Duration>,
    cancel_token: CancellationToken,
}

impl OperationRunner {
    /// Create a runner with the default policy (continue, no deadline)
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::boxed(Box::new(connector))
    }

    /// Create a runner over a connector chosen at runtime
    pub fn boxed(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            fault_policy: FaultPolicy::default(),
            operation_timeout: None,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Apply fault policy and deadline from configuration
    pub fn with_config(self, config: &RunnerConfig) -> Self {
        self.with_fault_policy(config.fault_policy)
            .with_operation_timeout(config.operation_timeout.map(Duration::from_secs))
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Use `token` to interrupt runs (e.g. on Ctrl+C)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Token that interrupts this runner
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    /// Execute `catalog` against the collection named by `config`
    ///
    /// # Returns
    /// * `Ok(RunReport)` - One outcome per executed operation; operation
    ///   failures are recorded there, never returned
    /// * `Err(...)` - Invalid configuration or connection failure
    pub async fn run(
        &self,
        config: &ConnectionConfig,
        catalog: &Catalog,
        reporter: &mut dyn Reporter,
    ) -> Result<RunReport> {
        config.validate()?;

        if self.cancel_token.is_cancelled() {
            info!("Run cancelled before connecting");
            return Ok(RunReport {
                cancelled: true,
                ..RunReport::default()
            });
        }

        info!(
            "Connecting to {} ({})",
            sanitize_uri(&config.uri),
            config.namespace()
        );
        let mut store = tokio::select! {
            store = self.connector.connect(config) => store?,
            _ = self.cancel_token.cancelled() => {
                info!("Run cancelled while connecting");
                return Ok(RunReport {
                    cancelled: true,
                    ..RunReport::default()
                });
            }
        };

        let report = self.execute_all(store.as_ref(), catalog, reporter).await;

        match store.close().await {
            Ok(()) => info!("Connection to {} closed", config.namespace()),
            Err(e) => warn!("Failed to close connection: {}", e),
        }

        Ok(report)
    }

    async fn execute_all(
        &self,
        store: &dyn DocumentStore,
        catalog: &Catalog,
        reporter: &mut dyn Reporter,
    ) -> RunReport {
        let mut report = RunReport::default();

        for (index, operation) in catalog.iter().enumerate() {
            if self.cancel_token.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let (outcome, cancelled) = self.execute_one(store, operation).await;
            reporter.report(index, &outcome);
            let failed = !outcome.success;
            report.outcomes.push(outcome);

            if cancelled {
                report.cancelled = true;
                break;
            }

            if failed && self.fault_policy == FaultPolicy::Abort {
                warn!("Stopping run after failed operation '{}'", operation.name);
                report.aborted_at = Some(index);
                break;
            }
        }

        info!(
            "Run finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        report
    }

    /// Run one operation under the deadline and cancellation token
    async fn execute_one(&self, store: &dyn DocumentStore, operation: &Operation) -> (Outcome, bool) {
        info!("Running '{}' ({})", operation.name, operation.kind.label());
        debug!("Arguments: {}", operation.kind.arguments());

        let start = Instant::now();
        let call = dispatch(store, &operation.kind);
        let guarded = async {
            match self.operation_timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(OperationError::Timeout(limit).into()),
                },
                None => call.await,
            }
        };

        let result = tokio::select! {
            result = guarded => result,
            _ = self.cancel_token.cancelled() => Err(CatalogError::from(
                OperationError::Cancelled("interrupted by user".to_string()),
            )),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(data) => {
                info!("'{}' completed in {}ms", operation.name, elapsed_ms);
                (Outcome::success(operation, data, elapsed_ms), false)
            }
            Err(e) => {
                let cancelled = matches!(e, CatalogError::Operation(OperationError::Cancelled(_)));
                warn!("'{}' failed: {}", operation.name, e);
                (Outcome::failure(operation, e.to_string(), elapsed_ms), cancelled)
            }
        }
    }
}

/// Route an operation to the matching store capability
async fn dispatch(store: &dyn DocumentStore, kind: &OperationKind) -> Result<OutcomeData> {
    match kind {
        OperationKind::Find { filter, options } => store
            .find(filter.clone(), options.clone())
            .await
            .map(OutcomeData::Documents),
        OperationKind::UpdateOne { filter, update } => store
            .update_one(filter.clone(), update.clone())
            .await
            .map(|summary| OutcomeData::Update {
                matched: summary.matched,
                modified: summary.modified,
            }),
        OperationKind::DeleteOne { filter } => store
            .delete_one(filter.clone())
            .await
            .map(|deleted| OutcomeData::Delete { deleted }),
        OperationKind::Aggregate { pipeline } => store
            .aggregate(pipeline.clone())
            .await
            .map(OutcomeData::Documents),
        OperationKind::CreateIndex { keys, options } => store
            .create_index(keys.clone(), options.clone())
            .await
            .map(|name| OutcomeData::IndexCreated { name }),
        OperationKind::ListIndexes => store.list_indexes().await.map(OutcomeData::Documents),
    }
}
