use thiserror::Error;

#[derive(Error, Debug)]
pub enum PilotError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Script execution failed: {0}")]
    ScriptFailed(String),

    #[error("Interaction failed: {0}")]
    InteractionFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Action timed out: {0}")]
    ActionTimeout(String),

    #[error("Run exceeded the {0} ms execution deadline")]
    RunTimeout(u64),

    #[error("Run cancelled")]
    RunCancelled,

    #[error("Domain not allowed: {0}")]
    DomainBlocked(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unsupported selector syntax: {0}")]
    InvalidSelector(String),

    #[error("DOM snapshot unavailable")]
    SnapshotUnavailable,

    #[error("{0} selectors unresolved under strict matching")]
    UnresolvedSelectors(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PilotError>;

impl From<anyhow::Error> for PilotError {
    fn from(err: anyhow::Error) -> Self {
        PilotError::Internal(err.to_string())
    }
}

impl PilotError {
    /// Transient failures worth another attempt while the page settles.
    /// Everything else, blocked domains and validation included, is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PilotError::ElementNotFound(_) | PilotError::ActionTimeout(_)
        )
    }
}
