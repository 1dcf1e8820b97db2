use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::{diff, DomDiff, ScraperDom, SnapshotStage, SnapshotStore};
use crate::errors::{PilotError, Result};
use crate::healing::{SelectorMap, SelectorResolution, SelectorResolver};

/// Roll-up counts across every entry in a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingSummary {
    pub total_selectors: usize,
    pub primary_matched: usize,
    pub healed_with_fallback: usize,
    pub unresolved: usize,
    pub dom_diff_available: bool,
}

/// Full diagnostic output: per-selector resolution keyed by exact
/// selector, plus the structural drift between the before and after
/// snapshots when both parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingReport {
    pub summary: HealingSummary,
    pub selector_resolution: BTreeMap<String, SelectorResolution>,
    pub dom_diff: Option<DomDiff>,
}

/// Diagnoses selector drift for a run. Resolution always targets the
/// current snapshot; before and after feed only the structural diff.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealingDiagnostics {
    strict: bool,
}

impl HealingDiagnostics {
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// Strict mode turns any unresolved selector into an error instead of
    /// a report entry.
    pub fn strict() -> Self {
        Self { strict: true }
    }

    pub fn diagnose(
        &self,
        selectors: &SelectorMap,
        before_html: &str,
        after_html: &str,
        current_html: &str,
    ) -> Result<HealingReport> {
        let current = ScraperDom::parse(current_html).ok();
        if current.is_none() {
            debug!("current snapshot unavailable; selectors cannot be resolved");
        }

        let mut resolution = BTreeMap::new();
        let mut summary = HealingSummary {
            total_selectors: selectors.len(),
            ..HealingSummary::default()
        };
        for (exact, entry) in selectors {
            let outcome = match &current {
                Some(dom) => SelectorResolver::resolve(entry, dom),
                None => SelectorResolution::unavailable(),
            };
            if outcome.matched {
                if outcome.healed {
                    summary.healed_with_fallback += 1;
                } else {
                    summary.primary_matched += 1;
                }
            } else {
                summary.unresolved += 1;
            }
            resolution.insert(exact.clone(), outcome);
        }

        let dom_diff = match (ScraperDom::parse(before_html), ScraperDom::parse(after_html)) {
            (Ok(before), Ok(after)) => Some(diff(&before, &after)),
            _ => {
                debug!("before/after snapshot missing or unparseable; skipping dom diff");
                None
            }
        };
        summary.dom_diff_available = dom_diff.is_some();

        if self.strict && summary.unresolved > 0 {
            return Err(PilotError::UnresolvedSelectors(summary.unresolved));
        }
        Ok(HealingReport {
            summary,
            selector_resolution: resolution,
            dom_diff,
        })
    }

    /// Diagnoses straight from a run's snapshot store; stages never
    /// captured degrade to the unavailable path.
    pub fn diagnose_store(
        &self,
        selectors: &SelectorMap,
        store: &SnapshotStore,
    ) -> Result<HealingReport> {
        self.diagnose(
            selectors,
            store.html(SnapshotStage::Before).unwrap_or(""),
            store.html(SnapshotStage::After).unwrap_or(""),
            store.html(SnapshotStage::Current).unwrap_or(""),
        )
    }
}
