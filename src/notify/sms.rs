//! Short-message channel over a generic HTTP gateway.
//!
//! The gateway receives `{"phones": [...], "message": "..."}` and an optional
//! bearer key. A 2xx reply is success unless its JSON body says
//! `"success": false`.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{BatchSummary, ChannelError, NotificationChannel};
use crate::utils::truncate_chars;

const MAX_MESSAGE_CHARS: usize = 140;

pub struct SmsChannel {
    client: Client,
    gateway_url: String,
    api_key: Option<String>,
    phones: Vec<String>,
}

impl SmsChannel {
    pub fn new(
        client: Client,
        gateway_url: String,
        api_key: Option<String>,
        phones: Vec<String>,
    ) -> Self {
        Self {
            client,
            gateway_url,
            api_key,
            phones,
        }
    }
}

fn message(summary: &BatchSummary) -> String {
    let first = summary
        .samples
        .first()
        .map(|s| format!(" e.g. {}", s.title))
        .unwrap_or_default();
    truncate_chars(
        &format!("{} from {}.{}", summary.headline(), summary.source_line(), first),
        MAX_MESSAGE_CHARS,
    )
}

fn interpret_reply(text: &str) -> Result<(), ChannelError> {
    let Ok(reply) = serde_json::from_str::<Value>(text) else {
        return Ok(());
    };
    if reply.get("success") == Some(&Value::Bool(false)) {
        return Err(ChannelError::Rejected {
            code: reply
                .get("code")
                .map(|c| c.to_string().trim_matches('"').to_string())
                .unwrap_or_else(|| "unknown".into()),
            message: reply
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn name(&self) -> &str {
        "sms"
    }

    async fn send(&self, summary: &BatchSummary) -> Result<(), ChannelError> {
        let body = json!({ "phones": self.phones, "message": message(summary) });
        let mut request = self.client.post(&self.gateway_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ChannelError::Rejected {
                code: status.as_u16().to_string(),
                message: truncate_chars(text.trim(), 200),
            });
        }
        interpret_reply(&text)
    }
}
