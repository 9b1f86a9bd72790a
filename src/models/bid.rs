//! Announcement data structures.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Dedup key derived from an announcement's title and URL.
///
/// Content is deliberately left out: bodies are fetched best-effort and the
/// same listing may come back with a different body on the next fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Derive the identity of a (title, url) pair.
    pub fn derive(title: &str, url: &str) -> Self {
        let title = normalize_whitespace(title);
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update([0x1f]);
        hasher.update(url.trim().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One announcement observed on a source during a cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidItem {
    /// Announcement title (never empty)
    pub title: String,

    /// Absolute URL of the announcement
    pub url: String,

    /// Publish date; adapters fall back to the fetch date
    pub publish_date: NaiveDate,

    /// Name of the source that produced the item
    pub source: String,

    /// Body text, empty when the adapter has none
    #[serde(default)]
    pub content: String,
}

impl BidItem {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        publish_date: NaiveDate,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            publish_date,
            source: source.into(),
            content: String::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Dedup identity of this item.
    pub fn identity(&self) -> ContentId {
        ContentId::derive(&self.title, &self.url)
    }
}

/// Persisted projection of a [`BidItem`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: ContentId,
    pub title: String,
    pub url: String,
    pub source: String,
    pub publish_date: NaiveDate,

    /// First time this identity was saved
    pub seen_at: DateTime<Utc>,

    /// Flips to true once, after a dispatch that included this record succeeded
    #[serde(default)]
    pub notified: bool,
}

impl StoredRecord {
    pub fn from_item(item: &BidItem, seen_at: DateTime<Utc>) -> Self {
        Self {
            id: item.identity(),
            title: item.title.clone(),
            url: item.url.clone(),
            source: item.source.clone(),
            publish_date: item.publish_date,
            seen_at,
            notified: false,
        }
    }
}

pub(crate) fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
