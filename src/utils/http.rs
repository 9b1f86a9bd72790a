// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;

/// Create a configured asynchronous HTTP client.
///
/// Per-request timeouts are set by callers; `default_timeout` only bounds
/// requests that do not set one.
pub fn create_async_client(user_agent: &str, default_timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(default_timeout)
        .build()?;
    Ok(client)
}
