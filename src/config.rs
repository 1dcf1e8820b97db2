use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, Result};

/// Top-level configuration for a workflow run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub browser: BrowserConfig,
    pub execution: ExecutionConfig,
    pub screenshots: ScreenshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub disable_images: bool,
    /// Extra command-line arguments passed to the browser process.
    pub args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport {
                width: 1280,
                height: 720,
            },
            user_agent: None,
            disable_images: false,
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Deadline for the whole run; the execution phase races against it.
    pub max_execution_ms: u64,
    /// Retries per step after the first failed attempt.
    pub step_retries: u32,
    /// Hostnames the run may navigate to or interact within. Empty means
    /// unrestricted.
    pub allowed_domains: Vec<String>,
    pub navigation_timeout_ms: u64,
    pub interaction_timeout_ms: u64,
    /// Base backoff; the sleep before retry N is `retry_backoff_ms * N`.
    pub retry_backoff_ms: u64,
}

impl ExecutionConfig {
    pub const MIN_EXECUTION_MS: u64 = 5_000;
    pub const MAX_EXECUTION_MS: u64 = 300_000;
    pub const MAX_STEP_RETRIES: u32 = 3;
    pub const MAX_ALLOWED_DOMAINS: usize = 25;

    /// Applies the submission-boundary ranges: numeric parameters clamp,
    /// an oversized allow-list is rejected rather than silently truncated.
    pub fn sanitized(mut self) -> Result<Self> {
        if self.allowed_domains.len() > Self::MAX_ALLOWED_DOMAINS {
            return Err(PilotError::Validation(format!(
                "allow-list has {} entries (limit {})",
                self.allowed_domains.len(),
                Self::MAX_ALLOWED_DOMAINS
            )));
        }
        self.max_execution_ms = self
            .max_execution_ms
            .clamp(Self::MIN_EXECUTION_MS, Self::MAX_EXECUTION_MS);
        self.step_retries = self.step_retries.min(Self::MAX_STEP_RETRIES);
        Ok(self)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_execution_ms: 120_000,
            step_retries: 1,
            allowed_domains: Vec::new(),
            navigation_timeout_ms: 30_000,
            interaction_timeout_ms: 12_000,
            retry_backoff_ms: 400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    pub enabled: bool,
    /// Where per-step captures are written. `None` keeps captures inline as
    /// base64 data URIs in the run record instead of touching the disk.
    pub directory: Option<PathBuf>,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: Some(PathBuf::from("screenshots")),
        }
    }
}
