//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{DelayRange, FetchStrategy, KeywordPolicy, SourceDescriptor};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Dedup store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Keyword policy applied to every candidate
    #[serde(default)]
    pub keywords: KeywordPolicy,

    /// Notification channels
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Optional secondary relevance check
    #[serde(default)]
    pub relevance: RelevanceConfig,

    /// Polled sources, visited in this order
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Sources that take part in a cycle.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.max_concurrent_sources == 0 {
            return Err(AppError::validation(
                "crawler.max_concurrent_sources must be > 0",
            ));
        }
        if self.notify.sample_limit == 0 {
            return Err(AppError::validation("notify.sample_limit must be > 0"));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            Self::validate_source(source)?;
            if !names.insert(source.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }

        for channel in &self.notify.channels {
            channel.validate()?;
        }

        if let Some(endpoint) = &self.relevance.endpoint {
            url::Url::parse(endpoint)?;
        }
        Ok(())
    }

    fn validate_source(source: &SourceDescriptor) -> Result<()> {
        if source.name.trim().is_empty() {
            return Err(AppError::validation("source with empty name"));
        }
        url::Url::parse(&source.url)?;
        if source.timeout_secs == 0 {
            return Err(AppError::validation(format!(
                "source '{}': timeout_secs must be > 0",
                source.name
            )));
        }
        if source.delay.max_ms() > DelayRange::MAX_MS {
            return Err(AppError::validation(format!(
                "source '{}': delay may not exceed {} ms",
                source.name,
                DelayRange::MAX_MS
            )));
        }
        match &source.strategy {
            FetchStrategy::Html(params) => {
                Selector::parse(&params.link_selector)
                    .map_err(|e| AppError::selector(&params.link_selector, format!("{e:?}")))?;
                for page in &params.pages {
                    url::Url::parse(page)?;
                }
            }
            FetchStrategy::JsonApi(params) => {
                if !params.items_pointer.starts_with('/') {
                    return Err(AppError::validation(format!(
                        "source '{}': items_pointer must be a JSON pointer",
                        source.name
                    )));
                }
                if params.url_template.trim().is_empty() {
                    return Err(AppError::validation(format!(
                        "source '{}': url_template is empty",
                        source.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Sources fetched at the same time; 1 keeps visits strictly sequential
    #[serde(default = "defaults::max_concurrent_sources")]
    pub max_concurrent_sources: usize,

    /// Case-insensitive payload markers of anti-automation pages
    #[serde(default = "defaults::block_markers")]
    pub block_markers: Vec<String>,

    /// HTTP statuses treated as an active block rather than a transient error
    #[serde(default = "defaults::blocked_statuses")]
    pub blocked_statuses: Vec<u16>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            max_concurrent_sources: defaults::max_concurrent_sources(),
            block_markers: defaults::block_markers(),
            blocked_statuses: defaults::blocked_statuses(),
        }
    }
}

/// Dedup store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding seen announcements
    #[serde(default = "defaults::store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: defaults::store_path(),
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Sample titles included in a batch summary
    #[serde(default = "defaults::sample_limit")]
    pub sample_limit: usize,

    /// Timeout for a single channel call
    #[serde(default = "defaults::channel_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            sample_limit: defaults::sample_limit(),
            timeout_secs: defaults::channel_timeout(),
            channels: Vec::new(),
        }
    }
}

/// How an SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpTls {
    /// TLS from the first byte, usually port 465
    Implicit,
    /// Plain connection upgraded with STARTTLS, usually port 587
    Starttls,
}

impl SmtpTls {
    /// STARTTLS on 587 and 25, implicit TLS otherwise.
    pub fn for_port(port: Option<u16>) -> Self {
        match port {
            Some(587) | Some(25) => SmtpTls::Starttls,
            _ => SmtpTls::Implicit,
        }
    }
}

/// One configured notification channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    /// Direct message through PushPlus
    PushPlus {
        token: String,
        #[serde(default)]
        topic: Option<String>,
    },
    /// Group robot webhook (WeCom)
    Wecom { webhook_url: String },
    /// SMTP e-mail
    Email {
        smtp_host: String,
        #[serde(default)]
        smtp_port: Option<u16>,
        /// Derived from the port when unset
        #[serde(default)]
        smtp_tls: Option<SmtpTls>,
        username: String,
        password: String,
        from: String,
        to: Vec<String>,
    },
    /// Short message through an HTTP gateway
    Sms {
        gateway_url: String,
        #[serde(default)]
        api_key: Option<String>,
        phones: Vec<String>,
    },
}

impl ChannelConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelConfig::PushPlus { .. } => "pushplus",
            ChannelConfig::Wecom { .. } => "wecom",
            ChannelConfig::Email { .. } => "email",
            ChannelConfig::Sms { .. } => "sms",
        }
    }

    fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(AppError::validation(format!("{} channel: {msg}", self.kind())));
        match self {
            ChannelConfig::PushPlus { token, .. } if token.trim().is_empty() => {
                fail("token is empty")
            }
            ChannelConfig::Wecom { webhook_url } => {
                url::Url::parse(webhook_url)?;
                Ok(())
            }
            ChannelConfig::Email { to, .. } if to.is_empty() => fail("no recipients"),
            ChannelConfig::Sms {
                gateway_url,
                phones,
                ..
            } => {
                url::Url::parse(gateway_url)?;
                if phones.is_empty() {
                    return fail("no phone numbers");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// What to do with a keyword match when the relevance check itself fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep the item as if the check had approved it
    #[default]
    PassThrough,
    /// Drop the item; the check is authoritative
    Reject,
}

/// Secondary relevance check settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceConfig {
    /// Classifier endpoint; the check is disabled when absent
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub on_failure: FailurePolicy,

    #[serde(default = "defaults::channel_timeout")]
    pub timeout_secs: u64,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            on_failure: FailurePolicy::default(),
            timeout_secs: defaults::channel_timeout(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
    }
    pub fn max_concurrent_sources() -> usize {
        1
    }
    pub fn block_markers() -> Vec<String> {
        vec![
            "captcha".into(),
            "验证码".into(),
            "安全验证".into(),
            "access denied".into(),
            "请开启javascript".into(),
        ]
    }
    pub fn blocked_statuses() -> Vec<u16> {
        vec![403]
    }
    pub fn store_path() -> PathBuf {
        PathBuf::from("data/seen.json")
    }
    pub fn sample_limit() -> usize {
        10
    }
    pub fn channel_timeout() -> u64 {
        10
    }
}
