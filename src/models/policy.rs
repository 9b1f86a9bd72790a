//! Keyword policy definition.

use serde::{Deserialize, Serialize};

/// Three term groups evaluated against an announcement's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordPolicy {
    /// OR group: at least one must appear (empty = no industry filter)
    #[serde(default)]
    pub industry: Vec<String>,

    /// AND group: all must appear (empty = vacuously true)
    #[serde(default)]
    pub must_contain: Vec<String>,

    /// NOT group: none may appear; takes precedence over the other groups
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl KeywordPolicy {
    pub fn new<I, M, E>(industry: I, must_contain: M, exclude: E) -> Self
    where
        I: IntoIterator<Item: Into<String>>,
        M: IntoIterator<Item: Into<String>>,
        E: IntoIterator<Item: Into<String>>,
    {
        Self {
            industry: industry.into_iter().map(Into::into).collect(),
            must_contain: must_contain.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }
}
