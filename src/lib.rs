pub mod browser;
pub mod config;
pub mod dom;
pub mod errors;
pub mod guard;
pub mod healing;
pub mod testing;
pub mod types;
pub mod utils;
pub mod workflow;

#[cfg(feature = "chrome")]
pub use browser::ChromeSession;
pub use browser::{BrowserSession, ExtractMode};
pub use config::{BrowserConfig, Config, ExecutionConfig, ScreenshotConfig, Viewport};
pub use dom::{DomDiff, DomQueryable, ScraperDom, SnapshotStage, SnapshotStore};
pub use errors::{PilotError, Result};
pub use guard::DomainGuard;
pub use healing::{
    HealingDiagnostics, HealingReport, SelectorEntry, SelectorMap, SelectorResolution,
    SelectorResolver,
};
pub use types::*;
pub use workflow::{JobRegistry, PageClassifier, ProgressBus, WorkflowExecutor};
