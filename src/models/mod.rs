// src/models/mod.rs

//! Domain models for the monitor.
//!
//! This module contains the data structures shared by the pipeline stages,
//! organized by their primary purpose.

mod bid;
mod config;
mod policy;
mod source;

// Re-export all public types
pub(crate) use bid::normalize_whitespace;
pub use bid::{BidItem, ContentId, StoredRecord};
pub use config::{
    ChannelConfig, Config, CrawlerConfig, FailurePolicy, NotifyConfig, RelevanceConfig,
    SmtpTls, StoreConfig,
};
pub use policy::KeywordPolicy;
pub use source::{
    AccessMode, DelayRange, FetchStrategy, HtmlParams, HttpMethod, JsonApiParams,
    SourceDescriptor,
};
