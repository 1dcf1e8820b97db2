pub mod classify;
pub mod executor;
pub mod progress;
pub mod registry;
pub mod validate;

pub use classify::{PageClassifier, PageKind, UrlHeuristicClassifier};
pub use executor::WorkflowExecutor;
pub use progress::{ProgressBus, RunUpdate};
pub use registry::{JobHandle, JobRegistry};
pub use validate::{clamp_wait_ms, validate_workflow};
