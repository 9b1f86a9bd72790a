//! Batch summary rendering.

use chrono::{DateTime, Local};

use crate::models::BidItem;
use crate::utils::truncate_chars;

/// One sample line of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub title: String,
    pub url: String,
    pub source: String,
}

/// What every channel receives for one cycle.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Items in the whole batch, not just the samples
    pub count: usize,
    /// Distinct source names in first-seen order
    pub sources: Vec<String>,
    pub samples: Vec<Sample>,
    pub generated_at: DateTime<Local>,
}

impl BatchSummary {
    pub fn from_items(items: &[BidItem], sample_limit: usize) -> Self {
        let mut sources: Vec<String> = Vec::new();
        for item in items {
            if !sources.contains(&item.source) {
                sources.push(item.source.clone());
            }
        }

        let samples = items
            .iter()
            .take(sample_limit)
            .map(|item| Sample {
                title: item.title.clone(),
                url: item.url.clone(),
                source: item.source.clone(),
            })
            .collect();

        Self {
            count: items.len(),
            sources,
            samples,
            generated_at: Local::now(),
        }
    }

    /// Items that did not make it into the samples.
    pub fn remaining(&self) -> usize {
        self.count.saturating_sub(self.samples.len())
    }

    pub fn headline(&self) -> String {
        format!("Bid monitor: {} new announcement(s)", self.count)
    }

    /// Source list for one line, shortened when long.
    pub fn source_line(&self) -> String {
        truncate_chars(&self.sources.join(", "), 40)
    }

    pub fn text(&self) -> String {
        let mut out = format!(
            "{}\nSources: {}\n\n",
            self.headline(),
            self.source_line()
        );
        for (i, sample) in self.samples.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} [{}]\n   {}\n",
                i + 1,
                sample.title,
                sample.source,
                sample.url
            ));
        }
        if self.remaining() > 0 {
            out.push_str(&format!("... and {} more\n", self.remaining()));
        }
        out
    }

    pub fn markdown(&self) -> String {
        let mut out = format!(
            "## {}\n> Sources: {}\n\n",
            self.headline(),
            self.source_line()
        );
        for sample in &self.samples {
            out.push_str(&format!("- [{}]({})\n", sample.title, sample.url));
        }
        if self.remaining() > 0 {
            out.push_str(&format!("\n... and {} more", self.remaining()));
        }
        out
    }

    pub fn html(&self) -> String {
        let mut out = format!(
            "<h3>{}</h3><p>Found <b>{}</b> new announcement(s)</p><p>Sources: {}</p><hr><ul>",
            escape_html(&self.headline()),
            self.count,
            escape_html(&self.source_line())
        );
        for sample in &self.samples {
            out.push_str(&format!(
                "<li><a href='{}'>{}</a> - {}</li>",
                escape_html(&sample.url),
                escape_html(&sample.title),
                escape_html(&sample.source)
            ));
        }
        if self.remaining() > 0 {
            out.push_str(&format!("<li>... and {} more</li>", self.remaining()));
        }
        out.push_str("</ul>");
        out
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&#39;")
        .replace('"', "&quot;")
}
