use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStage {
    Before,
    After,
    Current,
}

impl SnapshotStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotStage::Before => "before",
            SnapshotStage::After => "after",
            SnapshotStage::Current => "current",
        }
    }

    pub const ALL: [SnapshotStage; 3] = [
        SnapshotStage::Before,
        SnapshotStage::After,
        SnapshotStage::Current,
    ];
}

impl fmt::Display for SnapshotStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured page state, stamped with its stage and owning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub stage: SnapshotStage,
    pub run_id: String,
    pub captured_at: DateTime<Utc>,
    pub html: String,
}

/// Per-run holder for the `before`/`after`/`current` page snapshots.
///
/// Every stored snapshot gets a trailing comment stamp naming its stage and
/// run, so the three stage strings are pairwise distinct even when a caller
/// hands in identical HTML for each. The stamp is an HTML comment and is
/// invisible to tag/id/class diffing.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    run_id: String,
    slots: HashMap<SnapshotStage, DomSnapshot>,
}

impl SnapshotStore {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            slots: HashMap::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Stamps and stores a snapshot, replacing any earlier capture for the
    /// same stage.
    pub fn record(&mut self, stage: SnapshotStage, html: impl AsRef<str>) -> &DomSnapshot {
        let snapshot = DomSnapshot {
            stage,
            run_id: self.run_id.clone(),
            captured_at: Utc::now(),
            html: stamp(html.as_ref(), stage, &self.run_id),
        };
        self.slots.insert(stage, snapshot);
        &self.slots[&stage]
    }

    pub fn get(&self, stage: SnapshotStage) -> Option<&DomSnapshot> {
        self.slots.get(&stage)
    }

    pub fn html(&self, stage: SnapshotStage) -> Option<&str> {
        self.slots.get(&stage).map(|snapshot| snapshot.html.as_str())
    }

    pub fn is_complete(&self) -> bool {
        SnapshotStage::ALL
            .iter()
            .all(|stage| self.slots.contains_key(stage))
    }
}

fn stamp(html: &str, stage: SnapshotStage, run_id: &str) -> String {
    format!("{html}\n<!-- snapshot:{stage}:{run_id} -->")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_input_still_yields_distinct_stage_strings() {
        let mut store = SnapshotStore::new("run-1");
        let html = "<html><body><p>same</p></body></html>";
        store.record(SnapshotStage::Before, html);
        store.record(SnapshotStage::After, html);
        store.record(SnapshotStage::Current, html);

        let before = store.html(SnapshotStage::Before).unwrap();
        let after = store.html(SnapshotStage::After).unwrap();
        let current = store.html(SnapshotStage::Current).unwrap();
        assert_ne!(before, after);
        assert_ne!(before, current);
        assert_ne!(after, current);
    }

    #[test]
    fn stamp_names_stage_and_run() {
        let mut store = SnapshotStore::new("run-7");
        store.record(SnapshotStage::Current, "<p>x</p>");
        let html = store.html(SnapshotStage::Current).unwrap();
        assert!(html.contains("snapshot:current:run-7"));
        assert!(html.starts_with("<p>x</p>"));
    }

    #[test]
    fn recording_a_stage_twice_replaces_it() {
        let mut store = SnapshotStore::new("run-2");
        store.record(SnapshotStage::Before, "<p>one</p>");
        store.record(SnapshotStage::Before, "<p>two</p>");
        assert!(store.html(SnapshotStage::Before).unwrap().contains("two"));
        assert!(!store.is_complete());
    }

    #[test]
    fn store_is_complete_with_all_three_stages() {
        let mut store = SnapshotStore::new("run-3");
        for stage in SnapshotStage::ALL {
            store.record(stage, "<p>page</p>");
        }
        assert!(store.is_complete());
    }
}
