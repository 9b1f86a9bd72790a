//! Source descriptors and fetch strategies.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a source is accessed. Used to scope block-detection exemptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Html,
    JsonApi,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Html => "html",
            AccessMode::JsonApi => "json_api",
        }
    }
}

/// Fetch strategy of a source, resolved once from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetchStrategy {
    /// List every announcement-like link on one or more HTML pages
    Html(HtmlParams),
    /// Query a JSON listing endpoint
    JsonApi(JsonApiParams),
}

impl FetchStrategy {
    pub fn mode(&self) -> AccessMode {
        match self {
            FetchStrategy::Html(_) => AccessMode::Html,
            FetchStrategy::JsonApi(_) => AccessMode::JsonApi,
        }
    }
}

impl Default for FetchStrategy {
    fn default() -> Self {
        FetchStrategy::Html(HtmlParams::default())
    }
}

/// Parameters of the generic HTML link lister.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlParams {
    /// Additional list pages fetched after the source URL
    #[serde(default)]
    pub pages: Vec<String>,

    /// CSS selector for candidate links
    #[serde(default = "defaults::link_selector")]
    pub link_selector: String,

    /// Link texts shorter than this are navigation, not announcements
    #[serde(default = "defaults::min_title_chars")]
    pub min_title_chars: usize,
}

impl Default for HtmlParams {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            link_selector: defaults::link_selector(),
            min_title_chars: defaults::min_title_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Parameters of the JSON listing adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonApiParams {
    /// Listing endpoint; defaults to the source URL
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub method: HttpMethod,

    /// Form fields sent with POST requests
    #[serde(default)]
    pub form: BTreeMap<String, String>,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// JSON pointer to the array of items (e.g. `/t/search_ZbGg`)
    pub items_pointer: String,

    /// JSON pointer to a boolean that must be `true` for a well-formed reply
    #[serde(default)]
    pub success_pointer: Option<String>,

    #[serde(default = "defaults::title_field")]
    pub title_field: String,

    /// Detail URL template; `{field}` placeholders are filled from the item
    pub url_template: String,

    /// Item field holding the publish date (epoch millis or `YYYY-MM-DD`)
    #[serde(default)]
    pub date_field: Option<String>,

    #[serde(default)]
    pub content_field: Option<String>,
}

/// Inter-request delay: `base_ms + uniform(0, jitter_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    #[serde(default = "defaults::delay_base_ms")]
    pub base_ms: u64,
    #[serde(default = "defaults::delay_jitter_ms")]
    pub jitter_ms: u64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        base_ms: 0,
        jitter_ms: 0,
    };

    /// Longest gap a source may ask for between two requests.
    pub const MAX_MS: u64 = 60 * 60 * 1000;

    /// Upper end of the range.
    pub fn max_ms(&self) -> u64 {
        self.base_ms.saturating_add(self.jitter_ms)
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            base_ms: defaults::delay_base_ms(),
            jitter_ms: defaults::delay_jitter_ms(),
        }
    }
}

/// Static configuration of one polled source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Display name, unique across the configuration
    pub name: String,

    /// Entry URL of the source
    pub url: String,

    #[serde(default)]
    pub strategy: FetchStrategy,

    /// Maximum number of attempts per request
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Pacing between consecutive requests to this source
    #[serde(default)]
    pub delay: DelayRange,

    /// Base of the exponential retry backoff
    #[serde(default = "defaults::backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Access modes for which block detection is skipped
    #[serde(default)]
    pub block_exempt: Vec<AccessMode>,

    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
}

impl SourceDescriptor {
    /// Descriptor with default policy values for the given name and URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            strategy: FetchStrategy::default(),
            max_retries: defaults::max_retries(),
            delay: DelayRange::default(),
            backoff_base_ms: defaults::backoff_base_ms(),
            timeout_secs: defaults::timeout(),
            block_exempt: Vec::new(),
            enabled: true,
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.strategy.mode()
    }

    /// Whether block detection is skipped for this source's access mode.
    pub fn is_block_exempt(&self) -> bool {
        self.block_exempt.contains(&self.mode())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Number of attempts a request gets, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

mod defaults {
    pub fn link_selector() -> String {
        "a[href]".into()
    }
    pub fn min_title_chars() -> usize {
        4
    }
    pub fn title_field() -> String {
        "title".into()
    }
    pub fn delay_base_ms() -> u64 {
        1000
    }
    pub fn delay_jitter_ms() -> u64 {
        2000
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn backoff_base_ms() -> u64 {
        1000
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn enabled() -> bool {
        true
    }
}
