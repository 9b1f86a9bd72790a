// src/pipeline/relevance.rs

//! Optional secondary relevance check.
//!
//! Runs after the keyword match and before dedup. When the check itself
//! fails, the configured [`FailurePolicy`] decides whether the item is kept.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;
use crate::models::{BidItem, FailurePolicy, RelevanceConfig};

/// Classifier answer for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub relevant: bool,
    #[serde(default)]
    pub reason: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelevanceError {
    #[error("classifier unreachable: {0}")]
    Transport(String),
    #[error("classifier reply not understood: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait RelevanceFilter: Send + Sync {
    async fn check(&self, item: &BidItem) -> std::result::Result<Verdict, RelevanceError>;
}

/// Whether to keep an item, given the check result and the failure policy.
pub fn keep_item(
    result: &std::result::Result<Verdict, RelevanceError>,
    policy: FailurePolicy,
) -> bool {
    match result {
        Ok(verdict) => verdict.relevant,
        Err(_) => policy == FailurePolicy::PassThrough,
    }
}

#[derive(Serialize)]
struct CheckRequest<'a> {
    title: &'a str,
    content: &'a str,
    source: &'a str,
}

/// Classifier reached over HTTP: POSTs `{title, content, source}` and expects
/// `{"relevant": bool, "reason": "..."}`.
pub struct HttpRelevanceFilter {
    client: Client,
    endpoint: String,
}

impl HttpRelevanceFilter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Filter from configuration, or `None` when no endpoint is set.
    pub fn from_config(config: &RelevanceConfig) -> Result<Option<Self>> {
        config
            .endpoint
            .as_deref()
            .map(|endpoint| Self::new(endpoint, Duration::from_secs(config.timeout_secs.max(1))))
            .transpose()
    }
}

#[async_trait]
impl RelevanceFilter for HttpRelevanceFilter {
    async fn check(&self, item: &BidItem) -> std::result::Result<Verdict, RelevanceError> {
        let request = CheckRequest {
            title: &item.title,
            content: &item.content,
            source: &item.source,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RelevanceError::Transport(e.to_string()))?;

        response
            .json::<Verdict>()
            .await
            .map_err(|e| RelevanceError::Malformed(e.to_string()))
    }
}
