// src/matcher.rs

//! Boolean keyword matching.
//!
//! A policy has three groups evaluated in a fixed order over the case-folded
//! concatenation of title and content:
//!
//! 1. `exclude` (NOT): any hit rejects the item, whatever the other groups say
//! 2. `must_contain` (AND): every term must be present
//! 3. `industry` (OR): at least one term must be present, unless the group is empty

use crate::models::KeywordPolicy;

/// Why an item did not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Excluded(String),
    MissingRequired(String),
    NoIndustryTerm,
}

/// Outcome of matching one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    /// Industry term that matched, if any
    pub term: Option<String>,
    pub rejection: Option<Rejection>,
}

impl MatchResult {
    fn hit(term: Option<String>) -> Self {
        Self {
            matched: true,
            term,
            rejection: None,
        }
    }

    fn miss(rejection: Rejection) -> Self {
        Self {
            matched: false,
            term: None,
            rejection: Some(rejection),
        }
    }
}

/// Compiled keyword policy.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    industry: Vec<String>,
    must_contain: Vec<String>,
    exclude: Vec<String>,
}

impl KeywordMatcher {
    pub fn new(policy: &KeywordPolicy) -> Self {
        Self {
            industry: fold_terms(&policy.industry),
            must_contain: fold_terms(&policy.must_contain),
            exclude: fold_terms(&policy.exclude),
        }
    }

    /// Evaluate the policy against an item's title and content.
    pub fn matches(&self, title: &str, content: &str) -> MatchResult {
        let text = format!("{title} {content}").to_lowercase();

        if let Some(term) = self.exclude.iter().find(|t| text.contains(t.as_str())) {
            return MatchResult::miss(Rejection::Excluded(term.clone()));
        }

        if let Some(term) = self
            .must_contain
            .iter()
            .find(|t| !text.contains(t.as_str()))
        {
            return MatchResult::miss(Rejection::MissingRequired(term.clone()));
        }

        if self.industry.is_empty() {
            return MatchResult::hit(None);
        }

        match self.industry.iter().find(|t| text.contains(t.as_str())) {
            Some(term) => MatchResult::hit(Some(term.clone())),
            None => MatchResult::miss(Rejection::NoIndustryTerm),
        }
    }
}

/// One-shot convenience over [`KeywordMatcher`].
pub fn match_item(title: &str, content: &str, policy: &KeywordPolicy) -> MatchResult {
    KeywordMatcher::new(policy).matches(title, content)
}

fn fold_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
