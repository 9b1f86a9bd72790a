// src/adapters/html.rs

//! Generic HTML link lister.
//!
//! Treats every sufficiently long link on a listing page as a candidate
//! announcement. Keyword matching downstream decides which ones matter.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Local;
use scraper::{Html, Selector};
use url::Url;

use super::{ParseError, SourceAdapter};
use crate::models::{BidItem, HtmlParams, SourceDescriptor, normalize_whitespace};
use crate::services::{RawPayload, Target};
use crate::utils::{is_navigable_href, resolve_url};

pub struct HtmlLinkAdapter {
    params: HtmlParams,
}

impl HtmlLinkAdapter {
    pub fn new(params: HtmlParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl SourceAdapter for HtmlLinkAdapter {
    fn list_targets(&self, source: &SourceDescriptor) -> Vec<Target> {
        std::iter::once(source.url.as_str())
            .chain(self.params.pages.iter().map(String::as_str))
            .map(Target::get)
            .collect()
    }

    fn parse(
        &self,
        source: &SourceDescriptor,
        payload: &RawPayload,
    ) -> Result<Vec<BidItem>, ParseError> {
        // `Selector` is not Send; build it here rather than holding it across awaits.
        let selector =
            Selector::parse(&self.params.link_selector).map_err(|e| ParseError::Selector {
                selector: self.params.link_selector.clone(),
                message: e.to_string(),
            })?;

        let base = Url::parse(&payload.url).or_else(|_| Url::parse(&source.url)).ok();
        let today = Local::now().date_naive();
        let document = Html::parse_document(&payload.body);

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if !is_navigable_href(href) {
                continue;
            }

            let title = element
                .value()
                .attr("title")
                .map(normalize_whitespace)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| normalize_whitespace(&element.text().collect::<String>()));
            if title.chars().count() < self.params.min_title_chars {
                continue;
            }

            let url = match &base {
                Some(base) => resolve_url(base, href.trim()),
                None => href.trim().to_string(),
            };
            if !seen.insert(url.clone()) {
                continue;
            }

            items.push(BidItem::new(title, url, today, &source.name));
        }

        Ok(items)
    }
}
