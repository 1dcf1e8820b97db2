use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, Result};

/// Coarse page category attached to navigation logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    SearchResults,
    Login,
    Checkout,
    Article,
    Unknown,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchResults => "search_results",
            Self::Login => "login",
            Self::Checkout => "checkout",
            Self::Article => "article",
            Self::Unknown => "unknown",
        }
    }
}

/// Classification seam. The executor only logs the result, so swapping
/// in a model-backed classifier needs no executor change.
pub trait PageClassifier: Send + Sync {
    fn classify(&self, url: &str) -> PageKind;
}

/// Default classifier: ordered URL pattern rules, first match wins.
pub struct UrlHeuristicClassifier {
    rules: Vec<(Regex, PageKind)>,
}

impl UrlHeuristicClassifier {
    pub fn new() -> Self {
        let table = [
            (r"[?&](q|query|search)=", PageKind::SearchResults),
            (r"/search(/|\?|$)", PageKind::SearchResults),
            (r"/(login|signin|sign-in|auth)(/|\?|$)", PageKind::Login),
            (r"/(cart|checkout|basket|payment)(/|\?|$)", PageKind::Checkout),
            (r"/(blog|article|post|news)/", PageKind::Article),
        ];
        let rules = table
            .into_iter()
            .filter_map(|(pattern, kind)| Regex::new(pattern).ok().map(|re| (re, kind)))
            .collect();
        Self { rules }
    }

    /// Appends a custom rule. Custom rules run after the built-ins.
    pub fn push_rule(&mut self, pattern: &str, kind: PageKind) -> Result<()> {
        let re = Regex::new(pattern)
            .map_err(|e| PilotError::Validation(format!("invalid classifier pattern: {e}")))?;
        self.rules.push((re, kind));
        Ok(())
    }
}

impl Default for UrlHeuristicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PageClassifier for UrlHeuristicClassifier {
    fn classify(&self, url: &str) -> PageKind {
        let url = url.to_lowercase();
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(&url))
            .map(|(_, kind)| *kind)
            .unwrap_or(PageKind::Unknown)
    }
}
