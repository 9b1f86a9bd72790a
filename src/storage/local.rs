//! JSON file store.
//!
//! Keeps the whole record table in memory behind a lock and rewrites the
//! file after every change. Writes go to a sibling temp file that is then
//! renamed over the target, so a crash never leaves a half-written file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::table::{self, Table};
use super::{BidStore, SeenSnapshot, SnapshotRef};
use crate::error::{AppError, Result};
use crate::models::{BidItem, ContentId, StoredRecord};

pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<Table>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing records. A missing file is
    /// an empty store; an unreadable or corrupt one is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match read_bytes(&path).await? {
            Some(bytes) => {
                let snapshot: SeenSnapshot = serde_json::from_slice(&bytes)
                    .map_err(|e| AppError::store(format!("{}: {e}", path.display())))?;
                snapshot.records
            }
            None => Table::new(),
        };

        log::debug!("Opened store {} with {} records", path.display(), records.len());
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    async fn persist(&self, records: &Table) -> Result<()> {
        let bytes = serde_json::to_vec(&SnapshotRef::new(records)).map_err(AppError::store)?;
        write_bytes(&self.path, &bytes)
            .await
            .map_err(|e| AppError::store(format!("{}: {e}", self.path.display())))
    }
}

/// Write bytes atomically (write to temp, then rename).
async fn write_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await
}

/// Read bytes, returning None if the file doesn't exist.
async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::store(format!("{}: {e}", path.display()))),
    }
}

#[async_trait]
impl BidStore for JsonFileStore {
    async fn exists(&self, id: &ContentId) -> Result<bool> {
        Ok(self.records.lock().await.contains_key(id))
    }

    async fn get(&self, id: &ContentId) -> Result<Option<StoredRecord>> {
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn save(&self, item: &BidItem) -> Result<StoredRecord> {
        let mut records = self.records.lock().await;
        let (record, inserted) = table::upsert(&mut records, item);
        if inserted {
            if let Err(e) = self.persist(&records).await {
                records.remove(&record.id);
                return Err(e);
            }
        }
        Ok(record)
    }

    async fn save_many(&self, items: &[BidItem]) -> Result<Vec<StoredRecord>> {
        let mut records = self.records.lock().await;
        let mut saved = Vec::with_capacity(items.len());
        let mut inserted = Vec::new();
        for item in items {
            let (record, is_new) = table::upsert(&mut records, item);
            if is_new {
                inserted.push(record.id.clone());
            }
            saved.push(record);
        }

        if !inserted.is_empty() {
            if let Err(e) = self.persist(&records).await {
                for id in &inserted {
                    records.remove(id);
                }
                return Err(e);
            }
        }
        Ok(saved)
    }

    async fn mark_notified(&self, ids: &[ContentId]) -> Result<usize> {
        let mut records = self.records.lock().await;
        let flipped = table::mark(&mut records, ids);
        if !flipped.is_empty() {
            if let Err(e) = self.persist(&records).await {
                table::unmark(&mut records, &flipped);
                return Err(e);
            }
        }
        Ok(flipped.len())
    }

    async fn clear_all(&self) -> Result<usize> {
        let mut records = self.records.lock().await;
        let removed = records.len();
        self.persist(&Table::new()).await?;
        records.clear();
        log::info!("Cleared {} records from {}", removed, self.path.display());
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.lock().await.len())
    }

    async fn pending(&self) -> Result<Vec<StoredRecord>> {
        Ok(table::pending(&*self.records.lock().await))
    }
}
