//! Sample bookstore dataset
//!
//! `seed` loads the books the built-in catalog is written against, so a fresh
//! database gives meaningful results for every bookstore operation.

use mongodb::bson::{Document, doc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ConnectionConfig, sanitize_uri};
use crate::error::{CatalogError, OperationError, Result};
use crate::store::{Connector, DocumentStore};

/// Counts reported by [`seed`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Documents removed by `reset`
    pub removed: u64,

    /// Documents inserted
    pub inserted: u64,
}

/// The twelve sample books
pub fn sample_books() -> Vec<Document> {
    vec![
        book("To Kill a Mockingbird", "Harper Lee", "Fiction", 1960, 12.99, true, 336, "J. B. Lippincott & Co."),
        book("1984", "George Orwell", "Dystopian", 1949, 10.99, true, 328, "Secker & Warburg"),
        book("Pride and Prejudice", "Jane Austen", "Romance", 1813, 7.99, true, 432, "T. Egerton"),
        book("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 1925, 9.99, true, 180, "Charles Scribner's Sons"),
        book("Brave New World", "Aldous Huxley", "Dystopian", 1932, 11.50, false, 311, "Chatto & Windus"),
        book("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937, 14.99, true, 310, "George Allen & Unwin"),
        book("The Catcher in the Rye", "J.D. Salinger", "Fiction", 1951, 8.99, true, 224, "Little, Brown and Company"),
        book("Animal Farm", "George Orwell", "Political Satire", 1945, 8.50, false, 112, "Secker & Warburg"),
        book("The Lord of the Rings", "J.R.R. Tolkien", "Fantasy", 1954, 19.99, true, 1178, "Allen & Unwin"),
        book("The Alchemist", "Paulo Coelho", "Fiction", 1988, 10.99, true, 197, "HarperOne"),
        book("Moby Dick", "Herman Melville", "Adventure", 1851, 12.50, false, 635, "Harper & Brothers"),
        book("Wuthering Heights", "Emily Brontë", "Gothic Fiction", 1847, 9.99, true, 342, "Thomas Cautley Newby"),
    ]
}

#[allow(clippy::too_many_arguments)]
fn book(
    title: &str,
    author: &str,
    genre: &str,
    published_year: i32,
    price: f64,
    in_stock: bool,
    pages: i32,
    publisher: &str,
) -> Document {
    doc! {
        "title": title,
        "author": author,
        "genre": genre,
        "published_year": published_year,
        "price": price,
        "in_stock": in_stock,
        "pages": pages,
        "publisher": publisher,
    }
}

/// Insert the sample books into the configured collection
///
/// With `reset`, existing documents are deleted first. The store is closed
/// before returning, including when a write fails or `cancel_token` fires.
pub async fn seed(
    connector: &dyn Connector,
    config: &ConnectionConfig,
    reset: bool,
    cancel_token: &CancellationToken,
) -> Result<SeedSummary> {
    config.validate()?;

    info!("Seeding {} at {}", config.namespace(), sanitize_uri(&config.uri));
    let mut store = tokio::select! {
        store = connector.connect(config) => store?,
        _ = cancel_token.cancelled() => return Err(interrupted()),
    };

    let result = tokio::select! {
        result = load(store.as_ref(), reset) => result,
        _ = cancel_token.cancelled() => Err(interrupted()),
    };

    if let Err(e) = store.close().await {
        warn!("Failed to close connection: {}", e);
    }

    let summary = result?;
    info!(
        "Seeded {}: removed {}, inserted {}",
        config.namespace(),
        summary.removed,
        summary.inserted
    );
    Ok(summary)
}

fn interrupted() -> CatalogError {
    OperationError::Cancelled("interrupted by user".to_string()).into()
}

async fn load(store: &dyn DocumentStore, reset: bool) -> Result<SeedSummary> {
    let removed = if reset {
        store.delete_many(doc! {}).await?
    } else {
        0
    };
    let inserted = store.insert_many(sample_books()).await?;
    Ok(SeedSummary { removed, inserted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::ConnectionError;
    use crate::store::MemoryConnector;

    #[test]
    fn test_sample_books_shape() {
        let books = sample_books();
        assert_eq!(books.len(), 12);
        for book in &books {
            for field in [
                "title",
                "author",
                "genre",
                "published_year",
                "price",
                "in_stock",
                "pages",
                "publisher",
            ] {
                assert!(book.contains_key(field), "missing {field}");
            }
        }
        assert!(books.iter().any(|b| b.get_str("title").ok() == Some("Moby Dick")));
        assert!(books.iter().any(|b| b.get_str("title").ok() == Some("1984")));
    }

    #[tokio::test]
    async fn test_seed_appends_and_resets() {
        let connector = MemoryConnector::new();
        let config = ConnectionConfig::default();
        let token = CancellationToken::new();

        let first = seed(&connector, &config, false, &token).await.unwrap();
        assert_eq!(first, SeedSummary { removed: 0, inserted: 12 });

        let second = seed(&connector, &config, false, &token).await.unwrap();
        assert_eq!(second.inserted, 12);
        assert_eq!(connector.documents(&config.namespace()).len(), 24);

        let reset = seed(&connector, &config, true, &token).await.unwrap();
        assert_eq!(reset, SeedSummary { removed: 24, inserted: 12 });
        assert_eq!(connector.documents(&config.namespace()).len(), 12);

        assert_eq!(connector.connect_count(), 3);
        assert_eq!(connector.close_count(), 3);
    }

    #[test]
    fn test_seed_from_sync_code() {
        let connector = MemoryConnector::new();
        let summary = tokio_test::assert_ok!(tokio_test::block_on(seed(
            &connector,
            &ConnectionConfig::default(),
            false,
            &CancellationToken::new()
        )));
        assert_eq!(summary.inserted, 12);
    }

    #[tokio::test]
    async fn test_seed_rejects_bad_config_before_connecting() {
        let connector = MemoryConnector::new();
        let config = ConnectionConfig {
            database: String::new(),
            ..ConnectionConfig::default()
        };

        let err = seed(&connector, &config, false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Argument(_)));
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_seed_connection_failure() {
        let connector = MemoryConnector::new();
        connector.refuse_connections("no route to host");

        let err = seed(
            &connector,
            &ConnectionConfig::default(),
            true,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Connection(ConnectionError::ConnectionFailed(_))
        ));
        assert_eq!(connector.close_count(), 0);
    }

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
    async fn test_seed_cancelled_while_connecting() {
        let memory = MemoryConnector::new();
        let connector = StalledConnector {
            inner: memory.clone(),
        };
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel();
            })
        };

        let started = std::time::Instant::now();
        let err = seed(&connector, &ConnectionConfig::default(), false, &token)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(
            err,
            CatalogError::Operation(OperationError::Cancelled(_))
        ));
        assert_eq!(memory.connect_count(), 0);
        assert!(memory.documents(&ConnectionConfig::default().namespace()).is_empty());
    }
}
