//! In-memory store for tests and dry runs.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::BidStore;
use super::table::{self, Table};
use crate::error::Result;
use crate::models::{BidItem, ContentId, StoredRecord};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BidStore for MemoryStore {
    async fn exists(&self, id: &ContentId) -> Result<bool> {
        Ok(self.records.lock().await.contains_key(id))
    }

    async fn get(&self, id: &ContentId) -> Result<Option<StoredRecord>> {
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn save(&self, item: &BidItem) -> Result<StoredRecord> {
        let (record, _) = table::upsert(&mut *self.records.lock().await, item);
        Ok(record)
    }

    async fn mark_notified(&self, ids: &[ContentId]) -> Result<usize> {
        Ok(table::mark(&mut *self.records.lock().await, ids).len())
    }

    async fn clear_all(&self) -> Result<usize> {
        let mut records = self.records.lock().await;
        let removed = records.len();
        records.clear();
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.lock().await.len())
    }

    async fn pending(&self) -> Result<Vec<StoredRecord>> {
        Ok(table::pending(&*self.records.lock().await))
    }
}
