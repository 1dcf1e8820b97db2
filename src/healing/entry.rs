use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// A logical UI target: the selector recorded at authoring time plus the
/// derived fallback chain tried when the primary stops matching.
///
/// Fallbacks are deduplicated, never equal to the primary, and keep their
/// declared order; the resolver uses position as the tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorEntry {
    pub exact_selector: String,
    pub primary: String,
    pub fallbacks: Vec<String>,
}

impl SelectorEntry {
    pub fn new(
        exact_selector: impl Into<String>,
        primary: impl Into<String>,
        fallbacks: impl IntoIterator<Item = String>,
    ) -> Self {
        let primary = primary.into();
        let mut seen = Vec::new();
        for candidate in fallbacks {
            let candidate = candidate.trim().to_string();
            if candidate.is_empty() || candidate == primary || seen.contains(&candidate) {
                continue;
            }
            seen.push(candidate);
        }
        Self {
            exact_selector: exact_selector.into(),
            primary,
            fallbacks: seen,
        }
    }

    /// Builds an entry from a recorded element's tag and attributes,
    /// deriving fallbacks in priority order: id, name, data-testid,
    /// aria-label, then tag + classes.
    pub fn from_recorded(
        exact_selector: &str,
        tag: &str,
        attributes: &HashMap<String, String>,
    ) -> Self {
        let mut derived = Vec::new();
        if let Some(id) = non_empty(attributes.get("id")) {
            derived.push(format!("{}#{}", tag, css_escape(id)));
            derived.push(format!("#{}", css_escape(id)));
        }
        if let Some(name) = non_empty(attributes.get("name")) {
            derived.push(format!("{}[name='{}']", tag, name));
        }
        if let Some(testid) = non_empty(attributes.get("data-testid")) {
            derived.push(format!("{}[data-testid='{}']", tag, testid));
        }
        if let Some(label) = non_empty(attributes.get("aria-label")) {
            derived.push(format!("{}[aria-label='{}']", tag, label));
        }
        if let Some(class) = non_empty(attributes.get("class")) {
            let classes: Vec<String> = class.split_whitespace().map(css_escape).collect();
            if !classes.is_empty() {
                derived.push(format!("{}.{}", tag, classes.join(".")));
            }
        }
        Self::new(exact_selector, exact_selector, derived)
    }

    /// Primary first, then fallbacks in declared order.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

fn css_escape(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ' ' | '.' | '#' | ':' | '[' | ']' | '(' | ')' | '\'' | '"' => {
                format!("\\{c}")
            }
            _ => c.to_string(),
        })
        .collect()
}

/// Selector map keyed by exact selector; ordered so reports serialize
/// deterministically.
pub type SelectorMap = BTreeMap<String, SelectorEntry>;

/// Wire shape for one selector-map entry (the map key carries the exact
/// selector).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSelectorEntry {
    pub primary: String,
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

pub fn selector_map_from_raw(raw: BTreeMap<String, RawSelectorEntry>) -> SelectorMap {
    raw.into_iter()
        .map(|(exact, entry)| {
            let built = SelectorEntry::new(exact.clone(), entry.primary, entry.fallbacks);
            (exact, built)
        })
        .collect()
}
