use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::{DomQueryable, ScraperDom};
use crate::errors::PilotError;
use crate::healing::SelectorEntry;

/// One candidate tried during resolution, in the order it was tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionAttempt {
    pub selector: String,
    pub matched: bool,
}

/// Outcome of walking one entry's candidate chain against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorResolution {
    pub used_selector: Option<String>,
    pub matched: bool,
    pub healed: bool,
    pub attempts: Vec<ResolutionAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SelectorResolution {
    /// The no-snapshot outcome: nothing was tried, nothing matched.
    pub fn unavailable() -> Self {
        Self {
            used_selector: None,
            matched: false,
            healed: false,
            attempts: Vec::new(),
            reason: Some("snapshot unavailable".to_string()),
        }
    }
}

/// Walks candidate chains against a parsed DOM. Resolution is pure: it
/// never touches a live page and never mutates the entry.
pub struct SelectorResolver;

impl SelectorResolver {
    /// Tries the primary selector, then each fallback in order, returning
    /// on the first candidate with at least one match. Candidates the
    /// query engine rejects (unsupported syntax like `:contains`) are
    /// dropped without an attempt record; other per-candidate failures
    /// record a non-match and the walk continues.
    pub fn resolve<D: DomQueryable>(entry: &SelectorEntry, dom: &D) -> SelectorResolution {
        let mut attempts = Vec::new();
        for candidate in entry.candidates() {
            let elements = match dom.query(candidate) {
                Ok(elements) => elements,
                Err(PilotError::InvalidSelector(reason)) => {
                    debug!(selector = candidate, %reason, "dropping unsupported candidate");
                    continue;
                }
                Err(error) => {
                    debug!(selector = candidate, %error, "selector candidate failed; trying next");
                    attempts.push(ResolutionAttempt {
                        selector: candidate.to_string(),
                        matched: false,
                    });
                    continue;
                }
            };
            let matched = !elements.is_empty();
            attempts.push(ResolutionAttempt {
                selector: candidate.to_string(),
                matched,
            });
            if matched {
                return SelectorResolution {
                    used_selector: Some(candidate.to_string()),
                    matched: true,
                    healed: candidate != entry.primary,
                    attempts,
                    reason: None,
                };
            }
        }
        SelectorResolution {
            used_selector: None,
            matched: false,
            healed: false,
            attempts,
            reason: Some("no candidate matched".to_string()),
        }
    }

    /// Parses `html` and resolves against it; blank input short-circuits
    /// to the unavailable outcome.
    pub fn resolve_html(entry: &SelectorEntry, html: &str) -> SelectorResolution {
        match ScraperDom::parse(html) {
            Ok(dom) => Self::resolve(entry, &dom),
            Err(_) => SelectorResolution::unavailable(),
        }
    }
}
