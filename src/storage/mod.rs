//! Dedup state storage.
//!
//! A store is a persistent set of [`StoredRecord`]s keyed by [`ContentId`].
//! Records are created on the first dedup miss and only ever change by
//! flipping `notified` from false to true. `clear_all` is the only way
//! records disappear.
//!
//! ## File Layout
//!
//! ```text
//! data/
//! └── seen.json     # { updated_at, count, records: { <id>: <record> } }
//! ```

pub mod local;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{BidItem, ContentId, StoredRecord};

pub use local::JsonFileStore;
pub use memory::MemoryStore;

/// Persistent identity-keyed record set.
///
/// Every failure is an [`AppError::Store`](crate::error::AppError::Store).
#[async_trait]
pub trait BidStore: Send + Sync {
    async fn exists(&self, id: &ContentId) -> Result<bool>;

    async fn get(&self, id: &ContentId) -> Result<Option<StoredRecord>>;

    /// Insert the item if its identity is unknown. Returns the stored record,
    /// which is the pre-existing one, untouched, on a conflict.
    async fn save(&self, item: &BidItem) -> Result<StoredRecord>;

    /// [`save`](Self::save) for several items. Backends that persist on
    /// every change override this to write once for the whole slice.
    async fn save_many(&self, items: &[BidItem]) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            records.push(self.save(item).await?);
        }
        Ok(records)
    }

    /// Set `notified` on the given identities. Unknown identities are skipped.
    /// Returns how many records flipped.
    async fn mark_notified(&self, ids: &[ContentId]) -> Result<usize>;

    /// Remove every record. Returns how many were removed.
    async fn clear_all(&self) -> Result<usize>;

    async fn len(&self) -> Result<usize>;

    /// Records still waiting for a successful notification.
    async fn pending(&self) -> Result<Vec<StoredRecord>>;
}

/// On-disk snapshot of the record table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenSnapshot {
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub records: BTreeMap<ContentId, StoredRecord>,
}

impl SeenSnapshot {
    pub fn new(records: BTreeMap<ContentId, StoredRecord>) -> Self {
        Self {
            updated_at: Utc::now(),
            count: records.len(),
            records,
        }
    }
}

/// Borrowed form of [`SeenSnapshot`] for writing without copying the table.
#[derive(Debug, Serialize)]
pub(crate) struct SnapshotRef<'a> {
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub records: &'a BTreeMap<ContentId, StoredRecord>,
}

impl<'a> SnapshotRef<'a> {
    pub fn new(records: &'a BTreeMap<ContentId, StoredRecord>) -> Self {
        Self {
            updated_at: Utc::now(),
            count: records.len(),
            records,
        }
    }
}

/// Shared record-table operations.
pub(crate) mod table {
    use super::*;

    pub type Table = BTreeMap<ContentId, StoredRecord>;

    pub fn upsert(table: &mut Table, item: &BidItem) -> (StoredRecord, bool) {
        let id = item.identity();
        if let Some(existing) = table.get(&id) {
            return (existing.clone(), false);
        }
        let record = StoredRecord::from_item(item, Utc::now());
        table.insert(id, record.clone());
        (record, true)
    }

    /// Flip `notified` on the given ids. Returns the ids that flipped.
    pub fn mark(table: &mut Table, ids: &[ContentId]) -> Vec<ContentId> {
        let mut flipped = Vec::new();
        for id in ids {
            if let Some(record) = table.get_mut(id) {
                if !record.notified {
                    record.notified = true;
                    flipped.push(id.clone());
                }
            }
        }
        flipped
    }

    /// Undo a [`mark`] whose persist failed.
    pub fn unmark(table: &mut Table, ids: &[ContentId]) {
        for id in ids {
            if let Some(record) = table.get_mut(id) {
                record.notified = false;
            }
        }
    }

    pub fn pending(table: &Table) -> Vec<StoredRecord> {
        table.values().filter(|r| !r.notified).cloned().collect()
    }
}
