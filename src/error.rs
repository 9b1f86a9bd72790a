// src/error.rs

//! Unified error handling for the monitor.
//!
//! Only [`AppError`] crosses the public API. Per-source and per-channel
//! failures have their own types ([`crate::services::FetchError`],
//! [`crate::adapters::ParseError`], [`crate::notify::ChannelError`]) and are
//! reported as values inside a cycle outcome instead of being raised.

use std::fmt;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Dedup store unavailable; dedup correctness cannot be guaranteed.
    #[error("Store error: {0}")]
    Store(String),

    /// Notification channel could not be constructed
    #[error("Channel setup error for {channel}: {message}")]
    ChannelSetup { channel: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a store error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    /// Create a channel setup error.
    pub fn channel_setup(channel: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::ChannelSetup {
            channel: channel.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error means the dedup store is unusable.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
