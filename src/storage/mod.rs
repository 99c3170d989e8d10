// Storage module: SQLite persistence + async seams for the extraction engine.

pub mod sqlite;

pub use sqlite::SqliteStorage;

use crate::model::{Advertisement, ResolvedParts, StorageError};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Источник объявлений для обработки.
#[async_trait::async_trait]
pub trait AdSource: Send + Sync {
    async fn count_unprocessed(&self) -> Result<u64, StorageError>;
    /// Keyed pagination: ads with `ad_id > after_id`, smallest ids first.
    async fn fetch_unprocessed_batch(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<Advertisement>, StorageError>;
}

/// Приёмник результатов извлечения.
#[async_trait::async_trait]
pub trait ResultSink: Send + Sync {
    /// Idempotent upsert keyed by `ad_id`; returns the number of rows written.
    async fn save_results(&self, records: &[ResolvedParts]) -> Result<usize, StorageError>;
}

/// Хранилище за асинхронным мьютексом, разделяемое между задачами.
#[derive(Clone)]
pub struct SharedStorage {
    inner: Arc<Mutex<SqliteStorage>>,
}

impl SharedStorage {
    pub fn new(storage: SqliteStorage) -> Self {
        Self {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, SqliteStorage> {
        self.inner.lock().await
    }
}

#[async_trait::async_trait]
impl AdSource for SharedStorage {
    async fn count_unprocessed(&self) -> Result<u64, StorageError> {
        self.inner.lock().await.count_unprocessed()
    }

    async fn fetch_unprocessed_batch(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<Advertisement>, StorageError> {
        self.inner.lock().await.fetch_unprocessed_batch(after_id, limit)
    }
}

#[async_trait::async_trait]
impl ResultSink for SharedStorage {
    async fn save_results(&self, records: &[ResolvedParts]) -> Result<usize, StorageError> {
        self.inner.lock().await.save_results(records)
    }
}
