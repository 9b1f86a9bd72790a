//! PushPlus direct-message channel.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{BatchSummary, ChannelError, NotificationChannel, post_json};

const API_URL: &str = "https://www.pushplus.plus/send";

pub struct PushPlusChannel {
    client: Client,
    token: String,
    topic: Option<String>,
    endpoint: String,
}

impl PushPlusChannel {
    pub fn new(client: Client, token: String, topic: Option<String>) -> Self {
        Self {
            client,
            token,
            topic,
            endpoint: API_URL.to_string(),
        }
    }

    /// Point the channel at a different API host.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_body(&self, summary: &BatchSummary) -> Value {
        let mut body = json!({
            "token": self.token,
            "title": summary.headline(),
            "content": summary.html(),
            "template": "html",
        });
        if let Some(topic) = &self.topic {
            body["topic"] = Value::String(topic.clone());
        }
        body
    }
}

/// `code == 200` is success. 999 covers rate limiting and expired tokens.
fn interpret_reply(reply: &Value) -> Result<(), ChannelError> {
    let code = reply
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| ChannelError::Malformed("reply has no numeric code".into()))?;
    if code == 200 {
        return Ok(());
    }

    let message = reply
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    if code == 999 {
        log::warn!("PushPlus code 999: token expired or rate limited ({message})");
    }
    Err(ChannelError::Rejected {
        code: code.to_string(),
        message,
    })
}

#[async_trait]
impl NotificationChannel for PushPlusChannel {
    fn name(&self) -> &str {
        "pushplus"
    }

    async fn send(&self, summary: &BatchSummary) -> Result<(), ChannelError> {
        let reply = post_json(&self.client, &self.endpoint, &self.request_body(summary)).await?;
        interpret_reply(&reply)
    }
}
