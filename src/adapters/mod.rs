//! Source adapters.
//!
//! An adapter turns a [`SourceDescriptor`] into fetchable targets and parses
//! raw payloads into candidate items. Built-in adapters are chosen once per
//! source from its [`FetchStrategy`]; callers can register their own adapter
//! for a source name before a cycle runs.

pub mod html;
pub mod json_api;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{BidItem, FetchStrategy, SourceDescriptor};
use crate::services::{FetchError, RawPayload, Target, Transport};

pub use html::HtmlLinkAdapter;
pub use json_api::JsonApiAdapter;

/// Adapter could not extract items from an otherwise successful fetch.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field: {0}")]
    Missing(String),

    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },
}

/// Capability set of a source adapter.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Endpoints fetched for one cycle, in order.
    fn list_targets(&self, source: &SourceDescriptor) -> Vec<Target>;

    /// Fetch one target. Override when a source needs more than one plain request.
    async fn fetch(
        &self,
        transport: &dyn Transport,
        source: &SourceDescriptor,
        target: &Target,
    ) -> Result<RawPayload, FetchError> {
        transport.execute(target, source.timeout()).await
    }

    /// Reject payloads whose shape shows the request did not really succeed.
    fn check_payload(&self, _payload: &RawPayload) -> Result<(), FetchError> {
        Ok(())
    }

    /// Extract candidate items from a payload.
    fn parse(
        &self,
        source: &SourceDescriptor,
        payload: &RawPayload,
    ) -> Result<Vec<BidItem>, ParseError>;
}

/// Static table of adapters keyed by source name.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table for the given sources from their fetch strategies.
    pub fn from_sources<'a>(sources: impl IntoIterator<Item = &'a SourceDescriptor>) -> Self {
        let mut registry = Self::new();
        for source in sources {
            registry.register(&source.name, builtin(&source.strategy));
        }
        registry
    }

    /// Register or replace the adapter of a source.
    pub fn register(&mut self, source_name: &str, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(source_name.to_string(), adapter);
    }

    pub fn get(&self, source_name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(source_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Built-in adapter for a fetch strategy.
pub fn builtin(strategy: &FetchStrategy) -> Arc<dyn SourceAdapter> {
    match strategy {
        FetchStrategy::Html(params) => Arc::new(HtmlLinkAdapter::new(params.clone())),
        FetchStrategy::JsonApi(params) => Arc::new(JsonApiAdapter::new(params.clone())),
    }
}
