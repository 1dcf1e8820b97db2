pub mod capture;
pub mod diagnostics;
pub mod entry;
pub mod resolver;

pub use capture::{capture_current, capture_snapshot};
pub use diagnostics::{HealingDiagnostics, HealingReport, HealingSummary};
pub use entry::{selector_map_from_raw, RawSelectorEntry, SelectorEntry, SelectorMap};
pub use resolver::{ResolutionAttempt, SelectorResolution, SelectorResolver};
