//! Anti-automation detection on raw payloads.

use std::fmt;

use crate::models::CrawlerConfig;
use crate::services::RawPayload;

/// Evidence that a source is refusing automated access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSignal {
    /// HTTP status from the blocked set
    Status(u16),
    /// Successful response with nothing in it
    EmptyBody,
    /// Payload contains a challenge marker
    Marker(String),
}

impl fmt::Display for BlockSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSignal::Status(code) => write!(f, "blocked with HTTP {code}"),
            BlockSignal::EmptyBody => f.write_str("empty response body"),
            BlockSignal::Marker(marker) => write!(f, "challenge marker '{marker}'"),
        }
    }
}

/// Heuristic block detector.
#[derive(Debug, Clone)]
pub struct BlockDetector {
    markers: Vec<String>,
    blocked_statuses: Vec<u16>,
}

impl BlockDetector {
    pub fn new(markers: &[String], blocked_statuses: &[u16]) -> Self {
        Self {
            markers: markers
                .iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            blocked_statuses: blocked_statuses.to_vec(),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(&config.block_markers, &config.blocked_statuses)
    }

    /// Inspect a payload. Non-success statuses outside the blocked set are
    /// not a block signal; the caller treats them as transient errors.
    pub fn inspect(&self, payload: &RawPayload) -> Option<BlockSignal> {
        if self.blocked_statuses.contains(&payload.status) {
            return Some(BlockSignal::Status(payload.status));
        }
        if !payload.is_success() {
            return None;
        }
        if payload.body.trim().is_empty() {
            return Some(BlockSignal::EmptyBody);
        }

        let body = payload.body.to_lowercase();
        self.markers
            .iter()
            .find(|m| body.contains(m.as_str()))
            .map(|m| BlockSignal::Marker(m.clone()))
    }
}

impl Default for BlockDetector {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}
