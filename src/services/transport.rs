// src/services/transport.rs

//! Request targets, raw payloads and the HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::error::Result;
use crate::models::HttpMethod;
use crate::utils::http::create_async_client;

/// One fetchable endpoint of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    pub method: HttpMethod,
    pub form: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl Target {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            form: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            form,
            headers: Vec::new(),
        }
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }
}

/// Response as received, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    /// Final URL of the response
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl RawPayload {
    pub fn ok(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a single fetch attempt failed. Every variant is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network failure or timeout
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status outside the blocked set
    #[error("HTTP status {0}")]
    Status(u16),

    /// Response arrived but its shape was rejected by the adapter
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Transport(format!("timed out: {e}"))
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Executes a target request. Non-success statuses are returned as payloads.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> std::result::Result<RawPayload, FetchError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = create_async_client(user_agent, Duration::from_secs(60))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        target: &Target,
        timeout: Duration,
    ) -> std::result::Result<RawPayload, FetchError> {
        let mut request = match target.method {
            HttpMethod::Get => self.client.get(&target.url),
            HttpMethod::Post => self.client.post(&target.url).form(&target.form),
        };
        for (name, value) in &target.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;

        Ok(RawPayload { url, status, body })
    }
}
