use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, doc};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::error::{ArgumentError, ConnectionError};
use crate::seed::sample_books;
use crate::store::{FindOptions, MemoryConnector, UpdateSummary};

/// Collects reported outcomes for assertions
#[derive(Default)]
struct Collector {
    seen: Vec<(usize, String, bool)>,
}

impl Reporter for Collector {
    fn report(&mut self, index: usize, outcome: &Outcome) {
        self.seen.push((index, outcome.name.clone(), outcome.success));
    }
}

fn config() -> ConnectionConfig {
    ConnectionConfig::default()
}

fn bookstore_connector() -> MemoryConnector {
    MemoryConnector::with_documents(&config().namespace(), sample_books())
}

async fn run_catalog(runner: &OperationRunner, catalog: &Catalog) -> RunReport {
    let mut collector = Collector::default();
    runner
        .run(&config(), catalog, &mut collector)
        .await
        .unwrap()
}

fn failing_find(name: &str) -> Operation {
    Operation::find(name, doc! { "title": { "$regex": "^The" } })
}

#[tokio::test]
async fn test_bookstore_catalog_runs_end_to_end() {
    let connector = bookstore_connector();
    let runner = OperationRunner::new(connector.clone());
    let mut collector = Collector::default();

    let report = runner
        .run(&config(), &Catalog::bookstore(), &mut collector)
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 11);
    assert_eq!(report.failed(), 0, "{:?}", report.outcomes);
    assert!(report.is_complete());
    assert_eq!(collector.seen.len(), 11);
    assert!(collector.seen.iter().enumerate().all(|(i, (index, _, _))| i == *index));

    let o = &report.outcomes;
    assert_eq!(o[0].documents().len(), 4);
    assert_eq!(o[1].documents().len(), 4);
    assert_eq!(o[2].documents().len(), 2);
    assert_eq!(o[3].data, OutcomeData::Update { matched: 1, modified: 1 });
    assert_eq!(o[4].data, OutcomeData::Delete { deleted: 1 });

    assert_eq!(o[5].documents()[0].get_str("_id").unwrap(), "Fantasy");
    assert_eq!(o[6].documents().len(), 1);
    assert_eq!(o[6].documents()[0].get_str("_id").unwrap(), "George Orwell");

    let decades = o[7].documents();
    assert_eq!(decades.len(), 8);
    assert_eq!(decades[0].get_f64("_id").unwrap(), 1810.0);

    assert_eq!(
        o[8].data,
        OutcomeData::IndexCreated { name: "title_1".into() }
    );
    assert_eq!(
        o[9].data,
        OutcomeData::IndexCreated { name: "author_1_published_year_-1".into() }
    );
    let names: Vec<&str> = o[10]
        .documents()
        .iter()
        .map(|ix| ix.get_str("name").unwrap())
        .collect();
    assert_eq!(names, vec!["_id_", "title_1", "author_1_published_year_-1"]);

    assert_eq!(connector.connect_count(), 1);
    assert_eq!(connector.close_count(), 1);
}

#[tokio::test]
async fn test_find_returns_the_only_fiction_book() {
    let book = doc! { "title": "The Alchemist", "genre": "Fiction" };
    let connector = MemoryConnector::with_documents(
        &config().namespace(),
        vec![book.clone(), doc! { "title": "Dune", "genre": "Science Fiction" }],
    );
    let runner = OperationRunner::new(connector);

    let catalog = Catalog::new(vec![Operation::find("fiction", doc! { "genre": "Fiction" })]);
    let report = run_catalog(&runner, &catalog).await;

    let found = report.outcomes[0].documents();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get_str("title").unwrap(), "The Alchemist");
}

#[tokio::test]
async fn test_update_is_visible_to_later_finds() {
    let runner = OperationRunner::new(bookstore_connector());
    let catalog = Catalog::new(vec![
        Operation::update_one(
            "reprice",
            doc! { "title": "1984" },
            doc! { "$set": { "price": 13.99 } },
        ),
        Operation::find("check", doc! { "title": "1984" }),
    ]);

    let report = run_catalog(&runner, &catalog).await;

    assert_eq!(
        report.outcomes[0].data,
        OutcomeData::Update { matched: 1, modified: 1 }
    );
    let price = report.outcomes[1].documents()[0].get("price");
    assert_eq!(price, Some(&Bson::Double(13.99)));
}

#[tokio::test]
async fn test_delete_of_missing_title_is_not_an_error() {
    let connector = MemoryConnector::with_documents(
        &config().namespace(),
        vec![doc! { "title": "1984" }],
    );
    let runner = OperationRunner::new(connector.clone());
    let catalog = Catalog::new(vec![Operation::delete_one(
        "drop Moby Dick",
        doc! { "title": "Moby Dick" },
    )]);

    let report = run_catalog(&runner, &catalog).await;

    assert!(report.outcomes[0].success);
    assert_eq!(report.outcomes[0].data, OutcomeData::Delete { deleted: 0 });
    assert_eq!(connector.documents(&config().namespace()).len(), 1);
}

#[tokio::test]
async fn test_average_price_ties_keep_input_order() {
    let connector = MemoryConnector::with_documents(
        &config().namespace(),
        vec![
            doc! { "genre": "Poetry", "price": 10.0 },
            doc! { "genre": "Drama", "price": 10.0 },
            doc! { "genre": "Horror", "price": 20.0 },
        ],
    );
    let runner = OperationRunner::new(connector);
    let catalog = Catalog::bookstore()
        .select(&["Average price per genre".to_string()])
        .unwrap();

    let report = run_catalog(&runner, &catalog).await;

    let genres: Vec<&str> = report.outcomes[0]
        .documents()
        .iter()
        .map(|d| d.get_str("_id").unwrap())
        .collect();
    assert_eq!(genres, vec!["Horror", "Poetry", "Drama"]);
}

#[tokio::test]
async fn test_create_index_twice_lists_one_index() {
    let runner = OperationRunner::new(bookstore_connector());
    let catalog = Catalog::new(vec![
        Operation::create_index("first", doc! { "title": 1 }),
        Operation::create_index("again", doc! { "title": 1 }),
        Operation::list_indexes("list"),
    ]);

    let report = run_catalog(&runner, &catalog).await;

    assert_eq!(report.failed(), 0);
    let titles = report.outcomes[2]
        .documents()
        .iter()
        .filter(|ix| ix.get_document("key").ok() == Some(&doc! { "title": 1 }))
        .count();
    assert_eq!(titles, 1);
}

#[tokio::test]
async fn test_continue_policy_records_every_operation() {
    let connector = bookstore_connector();
    let runner = OperationRunner::new(connector.clone());
    let catalog = Catalog::new(vec![
        Operation::find("ok", doc! {}),
        failing_find("bad"),
        Operation::list_indexes("after"),
    ]);

    let report = run_catalog(&runner, &catalog).await;

    assert_eq!(report.outcomes.len(), catalog.len());
    assert!(!report.outcomes[1].success);
    assert_eq!(
        report.outcomes[1].error.as_deref(),
        Some("Unsupported operator: $regex")
    );
    assert!(report.outcomes[2].success);
    assert!(report.is_complete());
    assert_eq!(connector.close_count(), 1);
}

#[tokio::test]
async fn test_abort_policy_stops_at_first_fault() {
    let connector = bookstore_connector();
    let runner = OperationRunner::new(connector.clone()).with_fault_policy(FaultPolicy::Abort);
    let catalog = Catalog::new(vec![
        Operation::find("ok", doc! {}),
        failing_find("bad"),
        Operation::delete_one("never", doc! { "title": "1984" }),
    ]);

    let report = run_catalog(&runner, &catalog).await;

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.aborted_at, Some(1));
    assert!(!report.is_complete());
    assert_eq!(connector.documents(&config().namespace()).len(), 12);
    assert_eq!(connector.close_count(), 1);
}

#[tokio::test]
async fn test_runner_config_applies_policy() {
    let runner = OperationRunner::new(MemoryConnector::new()).with_config(&RunnerConfig {
        fault_policy: FaultPolicy::Abort,
        operation_timeout: Some(5),
    });
    assert_eq!(runner.fault_policy(), FaultPolicy::Abort);
    assert_eq!(runner.operation_timeout, Some(Duration::from_secs(5)));
}

#[tokio::test]
async fn test_empty_catalog_still_opens_and_closes() {
    let connector = MemoryConnector::new();
    let runner = OperationRunner::new(connector.clone());

    let report = run_catalog(&runner, &Catalog::default()).await;

    assert!(report.outcomes.is_empty());
    assert_eq!(connector.connect_count(), 1);
    assert_eq!(connector.close_count(), 1);
}

#[tokio::test]
async fn test_connection_failure_is_returned() {
    let connector = MemoryConnector::new();
    connector.refuse_connections("server selection timeout");
    let runner = OperationRunner::new(connector.clone());
    let mut collector = Collector::default();

    let err = runner
        .run(&config(), &Catalog::bookstore(), &mut collector)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CatalogError::Connection(ConnectionError::ConnectionFailed(_))
    ));
    assert!(collector.seen.is_empty());
    assert_eq!(connector.close_count(), 0);
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_connecting() {
    let connector = MemoryConnector::new();
    let runner = OperationRunner::new(connector.clone());
    let bad = ConnectionConfig {
        collection: String::new(),
        ..config()
    };

    let err = runner
        .run(&bad, &Catalog::bookstore(), &mut Collector::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Argument(ArgumentError::MissingField(_))));
    assert_eq!(connector.connect_count(), 0);
}

/// Delays every find so deadlines and cancellation can be observed
struct SlowConnector {
    inner: MemoryConnector,
    delay: Duration,
}

struct SlowStore {
    inner: Box<dyn DocumentStore>,
    delay: Duration,
}

#[async_trait]
impl Connector for SlowConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DocumentStore>> {
        let inner = self.inner.connect(config).await?;
        Ok(Box::new(SlowStore {
            inner,
            delay: self.delay,
        }))
    }
}

#[async_trait]
impl DocumentStore for SlowStore {
    fn namespace(&self) -> String {
        self.inner.namespace()
    }

    async fn find(&self, filter: Document, options: FindOptions) -> Result<Vec<Document>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find(filter, options).await
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateSummary> {
        self.inner.update_one(filter, update).await
    }

    async fn delete_one(&self, filter: Document) -> Result<u64> {
        self.inner.delete_one(filter).await
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        self.inner.aggregate(pipeline).await
    }

    async fn create_index(&self, keys: Document, options: Option<Document>) -> Result<String> {
        self.inner.create_index(keys, options).await
    }

    async fn list_indexes(&self) -> Result<Vec<Document>> {
        self.inner.list_indexes().await
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<u64> {
        self.inner.insert_many(documents).await
    }

    async fn delete_many(&self, filter: Document) -> Result<u64> {
        self.inner.delete_many(filter).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}

#[tokio::test]
async fn test_operation_deadline_fails_only_that_operation() {
    let memory = bookstore_connector();
    let runner = OperationRunner::new(SlowConnector {
        inner: memory.clone(),
        delay: Duration::from_secs(5),
    })
    .with_operation_timeout(Some(Duration::from_millis(50)));
    let catalog = Catalog::new(vec![
        Operation::find("slow", doc! {}),
        Operation::list_indexes("fast"),
    ]);

    let report = run_catalog(&runner, &catalog).await;

    assert_eq!(report.outcomes.len(), 2);
    assert!(!report.outcomes[0].success);
    assert_eq!(
        report.outcomes[0].error.as_deref(),
        Some("Operation timed out after 50ms")
    );
    assert!(report.outcomes[1].success);
    assert_eq!(memory.close_count(), 1);
}

#[tokio::test]
async fn test_cancellation_stops_run_and_closes() {
    let memory = bookstore_connector();
    let token = CancellationToken::new();
    let runner = OperationRunner::new(SlowConnector {
        inner: memory.clone(),
        delay: Duration::from_secs(30),
    })
    .with_cancellation(token.clone());
    let catalog = Catalog::new(vec![
        Operation::find("slow", doc! {}),
        Operation::delete_one("never", doc! { "title": "1984" }),
    ]);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });
    let report = run_catalog(&runner, &catalog).await;
    canceller.await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.outcomes.len(), 1);
    assert!(
        report.outcomes[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Cancelled")
    );
    assert_eq!(memory.documents(&config().namespace()).len(), 12);
    assert_eq!(memory.close_count(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_never_connects() {
    let connector = MemoryConnector::new();
    let runner = OperationRunner::new(connector.clone());
    runner.cancel_token().cancel();

    let report = run_catalog(&runner, &Catalog::bookstore()).await;

    assert!(report.cancelled);
    assert!(report.outcomes.is_empty());
    assert_eq!(connector.connect_count(), 0);
}

/// Connector whose handshake never finishes in test time
struct StalledConnector {
    inner: MemoryConnector,
}

#[async_trait]
impl Connector for StalledConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DocumentStore>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        self.inner.connect(config).await
    }
}

#[tokio::test]
async fn test_cancellation_interrupts_connect() {
    let memory = bookstore_connector();
    let token = CancellationToken::new();
    let runner = OperationRunner::new(StalledConnector {
        inner: memory.clone(),
    })
    .with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });
    let started = std::time::Instant::now();
    let report = run_catalog(&runner, &Catalog::bookstore()).await;
    canceller.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(report.cancelled);
    assert!(report.outcomes.is_empty());
    assert_eq!(memory.connect_count(), 0);
    assert_eq!(memory.close_count(), 0);
}

#[test]
fn test_closures_are_reporters() {
    let mut count = 0;
    {
        let mut reporter = |_: usize, _: &Outcome| count += 1;
        let op = Operation::list_indexes("ix");
        let outcome = Outcome::success(&op, OutcomeData::None, 0);
        Reporter::report(&mut reporter, 0, &outcome);
    }
    assert_eq!(count, 1);
}
