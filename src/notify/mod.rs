//! Notification fan-out.
//!
//! A cycle's matched items are summarised once and handed to every
//! configured channel. Channels fail independently; the dispatcher reports
//! per-channel results and never raises.

#[cfg(feature = "email")]
pub mod email;
pub mod pushplus;
pub mod sms;
pub mod summary;
pub mod wecom;

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::error::Result;
use crate::models::{BidItem, ChannelConfig, NotifyConfig};

pub use pushplus::PushPlusChannel;
pub use sms::SmsChannel;
pub use summary::{BatchSummary, Sample};
pub use wecom::WecomChannel;

#[cfg(feature = "email")]
pub use email::EmailChannel;

/// Why a channel call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Network failure or timeout
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider refused the message (rate limit, expired credentials, ...)
    #[error("rejected with code {code}: {message}")]
    Rejected { code: String, message: String },

    /// Provider reply could not be understood
    #[error("malformed reply: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ChannelError {
    fn from(e: reqwest::Error) -> Self {
        ChannelError::Transport(e.to_string())
    }
}

/// A delivery target for batch summaries.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, summary: &BatchSummary) -> std::result::Result<(), ChannelError>;
}

/// Result of one channel call.
#[derive(Debug, Clone)]
pub struct ChannelReport {
    pub channel: String,
    pub result: std::result::Result<(), ChannelError>,
}

/// Per-channel results of one dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub results: Vec<ChannelReport>,
}

impl DispatchReport {
    pub fn any_success(&self) -> bool {
        self.results.iter().any(|r| r.result.is_ok())
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ChannelError)> {
        self.results
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (r.channel.as_str(), e)))
    }
}

pub struct NotificationDispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
    sample_limit: usize,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>, sample_limit: usize) -> Self {
        Self {
            channels,
            sample_limit: sample_limit.max(1),
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        Ok(Self::new(build_channels(config)?, config.sample_limit))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Send one summary of `items` to every channel. An empty batch makes no calls.
    pub async fn dispatch(&self, items: &[BidItem]) -> DispatchReport {
        if items.is_empty() {
            return DispatchReport::default();
        }
        let summary = BatchSummary::from_items(items, self.sample_limit);
        self.dispatch_summary(&summary).await
    }

    pub async fn dispatch_summary(&self, summary: &BatchSummary) -> DispatchReport {
        if self.channels.is_empty() {
            log::warn!(
                "No notification channels configured; {} item(s) stay pending",
                summary.count
            );
            return DispatchReport::default();
        }

        let calls = self.channels.iter().map(|channel| async move {
            let result = channel.send(summary).await;
            match &result {
                Ok(()) => log::info!("[{}] sent summary of {} item(s)", channel.name(), summary.count),
                Err(e) => log::error!("[{}] send failed: {}", channel.name(), e),
            }
            ChannelReport {
                channel: channel.name().to_string(),
                result,
            }
        });

        DispatchReport {
            results: join_all(calls).await,
        }
    }
}

/// Construct the configured channels over one shared HTTP client.
pub fn build_channels(config: &NotifyConfig) -> Result<Vec<Box<dyn NotificationChannel>>> {
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let client = Client::builder().timeout(timeout).build()?;

    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
    for channel in &config.channels {
        match channel {
            ChannelConfig::PushPlus { token, topic } => channels.push(Box::new(
                PushPlusChannel::new(client.clone(), token.clone(), topic.clone()),
            )),
            ChannelConfig::Wecom { webhook_url } => channels.push(Box::new(WecomChannel::new(
                client.clone(),
                webhook_url.clone(),
            ))),
            ChannelConfig::Sms {
                gateway_url,
                api_key,
                phones,
            } => channels.push(Box::new(SmsChannel::new(
                client.clone(),
                gateway_url.clone(),
                api_key.clone(),
                phones.clone(),
            ))),
            #[cfg(feature = "email")]
            ChannelConfig::Email { .. } => {
                channels.push(Box::new(EmailChannel::from_config(channel, timeout)?))
            }
            #[cfg(not(feature = "email"))]
            ChannelConfig::Email { .. } => {
                return Err(crate::error::AppError::channel_setup(
                    "email",
                    "built without the `email` feature",
                ));
            }
        }
    }
    Ok(channels)
}

/// POST a JSON body and decode the JSON reply. Non-2xx is a rejection.
pub(crate) async fn post_json(
    client: &Client,
    url: &str,
    body: &Value,
) -> std::result::Result<Value, ChannelError> {
    let response = client.post(url).json(body).send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(ChannelError::Rejected {
            code: status.as_u16().to_string(),
            message: crate::utils::truncate_chars(text.trim(), 200),
        });
    }
    serde_json::from_str(&text).map_err(|e| ChannelError::Malformed(e.to_string()))
}
