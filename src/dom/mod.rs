pub mod diff;
pub mod query;
pub mod snapshot;

pub use diff::{diff, DomDiff, SetDiff, TagDelta};
pub use query::{DomQueryable, QueriedElement, ScraperDom};
pub use snapshot::{DomSnapshot, SnapshotStage, SnapshotStore};
