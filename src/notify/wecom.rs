//! WeCom group robot webhook.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{BatchSummary, ChannelError, NotificationChannel, post_json};
use crate::utils::truncate_chars;

/// Markdown messages above this size are refused by the robot API.
const MAX_MARKDOWN_CHARS: usize = 4000;

pub struct WecomChannel {
    client: Client,
    webhook_url: String,
}

impl WecomChannel {
    pub fn new(client: Client, webhook_url: String) -> Self {
        Self {
            client,
            webhook_url,
        }
    }
}

fn request_body(summary: &BatchSummary) -> Value {
    json!({
        "msgtype": "markdown",
        "markdown": { "content": truncate_chars(&summary.markdown(), MAX_MARKDOWN_CHARS) },
    })
}

fn interpret_reply(reply: &Value) -> Result<(), ChannelError> {
    match reply.get("errcode").and_then(Value::as_i64) {
        Some(0) => Ok(()),
        Some(code) => Err(ChannelError::Rejected {
            code: code.to_string(),
            message: reply
                .get("errmsg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        None => Err(ChannelError::Malformed("reply has no errcode".into())),
    }
}

#[async_trait]
impl NotificationChannel for WecomChannel {
    fn name(&self) -> &str {
        "wecom"
    }

    async fn send(&self, summary: &BatchSummary) -> Result<(), ChannelError> {
        let reply = post_json(&self.client, &self.webhook_url, &request_body(summary)).await?;
        interpret_reply(&reply)
    }
}
