use std::collections::{BTreeMap, BTreeSet};

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::dom::query::ScraperDom;

/// Structural difference between two snapshots: tag-count deltas plus
/// added/removed ids and class tokens, all collected under `<body>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomDiff {
    pub tags: Vec<TagDelta>,
    pub ids: SetDiff,
    pub classes: SetDiff,
}

impl DomDiff {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.ids.is_empty() && self.classes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDelta {
    pub tag: String,
    pub before: usize,
    pub after: usize,
    pub delta: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SetDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    fn between(before: &BTreeSet<String>, after: &BTreeSet<String>) -> Self {
        Self {
            added: after.difference(before).cloned().collect(),
            removed: before.difference(after).cloned().collect(),
        }
    }
}

#[derive(Default)]
struct BodyProfile {
    tags: BTreeMap<String, usize>,
    ids: BTreeSet<String>,
    classes: BTreeSet<String>,
}

fn profile(dom: &ScraperDom) -> BodyProfile {
    let everything = match Selector::parse("body *") {
        Ok(selector) => selector,
        Err(_) => return BodyProfile::default(),
    };
    let mut out = BodyProfile::default();
    for element in dom.document().select(&everything) {
        let value = element.value();
        *out.tags.entry(value.name().to_ascii_lowercase()).or_insert(0) += 1;
        if let Some(id) = value.id() {
            out.ids.insert(id.to_string());
        }
        for class in value.classes() {
            out.classes.insert(class.to_string());
        }
    }
    out
}

/// Compares `before` and `after` snapshots. Output ordering is sorted, so
/// two runs over the same inputs serialize identically.
pub fn diff(before: &ScraperDom, after: &ScraperDom) -> DomDiff {
    let before = profile(before);
    let after = profile(after);

    let all_tags: BTreeSet<&String> = before.tags.keys().chain(after.tags.keys()).collect();
    let tags = all_tags
        .into_iter()
        .filter_map(|tag| {
            let count_before = before.tags.get(tag).copied().unwrap_or(0);
            let count_after = after.tags.get(tag).copied().unwrap_or(0);
            if count_before == count_after {
                return None;
            }
            Some(TagDelta {
                tag: tag.clone(),
                before: count_before,
                after: count_after,
                delta: count_after as i64 - count_before as i64,
            })
        })
        .collect();

    DomDiff {
        tags,
        ids: SetDiff::between(&before.ids, &after.ids),
        classes: SetDiff::between(&before.classes, &after.classes),
    }
}
