// src/adapters/json_api.rs

//! JSON listing endpoint adapter.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use serde_json::Value;

use super::{ParseError, SourceAdapter};
use crate::models::{BidItem, HttpMethod, JsonApiParams, SourceDescriptor, normalize_whitespace};
use crate::services::{FetchError, RawPayload, Target};
use crate::utils::resolve;

pub struct JsonApiAdapter {
    params: JsonApiParams,
}

impl JsonApiAdapter {
    pub fn new(params: JsonApiParams) -> Self {
        Self { params }
    }

    fn item_from_json(&self, source: &SourceDescriptor, entry: &Value, today: NaiveDate) -> Option<BidItem> {
        let title = entry
            .get(&self.params.title_field)
            .and_then(Value::as_str)
            .map(normalize_whitespace)
            .filter(|t| !t.is_empty())?;

        let url = resolve(&source.url, &render_template(&self.params.url_template, entry));

        let publish_date = self
            .params
            .date_field
            .as_deref()
            .and_then(|field| entry.get(field))
            .and_then(parse_date)
            .unwrap_or(today);

        let content = self
            .params
            .content_field
            .as_deref()
            .and_then(|field| entry.get(field))
            .and_then(Value::as_str)
            .unwrap_or_default();

        Some(BidItem::new(title, url, publish_date, &source.name).with_content(content))
    }
}

#[async_trait]
impl SourceAdapter for JsonApiAdapter {
    fn list_targets(&self, source: &SourceDescriptor) -> Vec<Target> {
        let url = self.params.endpoint.clone().unwrap_or_else(|| source.url.clone());
        let headers: Vec<_> = self
            .params
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let target = match self.params.method {
            HttpMethod::Get => Target::get(url),
            HttpMethod::Post => Target::post_form(
                url,
                self.params
                    .form
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
        };
        vec![target.with_headers(headers)]
    }

    fn check_payload(&self, payload: &RawPayload) -> Result<(), FetchError> {
        let value: Value = serde_json::from_str(&payload.body)
            .map_err(|e| FetchError::Malformed(format!("not JSON: {e}")))?;

        if let Some(pointer) = &self.params.success_pointer {
            if value.pointer(pointer) != Some(&Value::Bool(true)) {
                return Err(FetchError::Malformed(format!("{pointer} is not true")));
            }
        }
        Ok(())
    }

    fn parse(
        &self,
        source: &SourceDescriptor,
        payload: &RawPayload,
    ) -> Result<Vec<BidItem>, ParseError> {
        let value: Value = serde_json::from_str(&payload.body)?;
        let entries = value
            .pointer(&self.params.items_pointer)
            .and_then(Value::as_array)
            .ok_or_else(|| ParseError::Missing(self.params.items_pointer.clone()))?;

        let today = Local::now().date_naive();
        Ok(entries
            .iter()
            .filter_map(|entry| self.item_from_json(source, entry, today))
            .collect())
    }
}

/// Fill `{field}` placeholders from a JSON object. Unknown fields render empty.
fn render_template(template: &str, entry: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let field = &after[..end];
                out.push_str(&scalar_text(entry.get(field)));
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Epoch milliseconds or a string starting with `YYYY-MM-DD`.
fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64()?;
            DateTime::from_timestamp_millis(millis).map(|dt| dt.with_timezone(&Local).date_naive())
        }
        Value::String(s) => {
            let head: String = s.trim().chars().take(10).collect();
            NaiveDate::parse_from_str(&head, "%Y-%m-%d").ok()
        }
        _ => None,
    }
}
