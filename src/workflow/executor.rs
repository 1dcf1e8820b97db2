use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info, warn};

#[cfg(feature = "chrome")]
use crate::browser::ChromeSession;
use crate::browser::{BrowserSession, ExtractMode};
use crate::config::Config;
use crate::errors::{PilotError, Result};
use crate::guard::DomainGuard;
use crate::types::{
    ExtractedItem, LogEntry, LogLevel, ScreenshotRecord, StepAction, Workflow, WorkflowRun,
    WorkflowStep,
};
use crate::utils::{screenshot, text};
use crate::workflow::classify::{PageClassifier, UrlHeuristicClassifier};
use crate::workflow::progress::{ProgressBus, RunUpdate};
use crate::workflow::registry::JobRegistry;
use crate::workflow::validate::{clamp_wait_ms, validate_workflow};

const BODY_PREVIEW_CHARS: usize = 500;

/// Runs workflows step by step against a browser session, producing a
/// complete run record whatever happens: the browser is always released
/// and the record always reflects the true outcome.
pub struct WorkflowExecutor {
    config: Config,
    guard: DomainGuard,
    classifier: Arc<dyn PageClassifier>,
    progress: ProgressBus,
    registry: Arc<JobRegistry>,
}

impl WorkflowExecutor {
    pub fn new(config: Config, registry: Arc<JobRegistry>) -> Self {
        let guard = DomainGuard::new(config.execution.allowed_domains.clone());
        Self {
            config,
            guard,
            classifier: Arc::new(UrlHeuristicClassifier::new()),
            progress: ProgressBus::new(),
            registry,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn PageClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn progress(&self) -> &ProgressBus {
        &self.progress
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Launches Chrome and runs the workflow on it. Rejected workflows
    /// and launch failures produce a failed run without ever touching a
    /// page.
    #[cfg(feature = "chrome")]
    pub async fn execute(&self, workflow: &Workflow) -> WorkflowRun {
        if let Err(rejection) = self.precheck(workflow) {
            return self.rejected_run(workflow, &rejection);
        }
        let session = match ChromeSession::launch(&self.config) {
            Ok(session) => session,
            Err(launch_error) => return self.rejected_run(workflow, &launch_error),
        };
        self.execute_with(session, workflow).await
    }

    /// Runs the workflow on an already open session. The session is
    /// closed before this returns, on every path.
    pub async fn execute_with<S: BrowserSession>(
        &self,
        mut session: S,
        workflow: &Workflow,
    ) -> WorkflowRun {
        let mut run = WorkflowRun::new(workflow_label(workflow));

        if let Err(rejection) = self.precheck(workflow) {
            self.record(&mut run, LogEntry::new(LogLevel::Error, rejection.to_string()));
            run.fail(rejection.to_string());
            self.close_session(&mut session, &run.id).await;
            self.publish(&run);
            return run;
        }

        let handle = self.registry.register(&run.id, &run.workflow_id).await;
        run.start();
        self.record(
            &mut run,
            LogEntry::new(LogLevel::Info, format!("run started for {}", workflow.url))
                .with_meta("url", json!(workflow.url))
                .with_meta("steps", json!(workflow.steps.len())),
        );

        let deadline = Duration::from_millis(self.config.execution.max_execution_ms);
        let outcome = tokio::select! {
            result = self.drive(&mut run, workflow, &session) => Some(result),
            _ = tokio::time::sleep(deadline) => None,
            _ = handle.cancelled() => Some(Err(PilotError::RunCancelled)),
        };

        match outcome {
            Some(Ok(())) => {
                if run.extracted_data.is_empty() {
                    self.fallback_extraction(&mut run, &session, workflow.steps.len())
                        .await;
                }
                self.record(&mut run, LogEntry::new(LogLevel::Info, "workflow completed"));
                run.complete();
            }
            Some(Err(step_error)) => {
                self.record(
                    &mut run,
                    LogEntry::new(LogLevel::Error, format!("run failed: {step_error}")),
                );
                run.fail(step_error.to_string());
            }
            None => {
                let timeout = PilotError::RunTimeout(self.config.execution.max_execution_ms);
                self.record(&mut run, LogEntry::new(LogLevel::Error, timeout.to_string()));
                run.fail(timeout.to_string());
            }
        }

        match session.console_logs().await {
            Ok(mut entries) => run.console_logs.append(&mut entries),
            Err(drain_error) => debug!(%drain_error, "console drain failed"),
        }
        self.close_session(&mut session, &run.id).await;
        self.registry.finish(&run.id).await;
        self.publish(&run);
        run
    }

    fn precheck(&self, workflow: &Workflow) -> Result<()> {
        validate_workflow(workflow)?;
        self.guard.ensure_allowed(&workflow.url)
    }

    fn rejected_run(&self, workflow: &Workflow, rejection: &PilotError) -> WorkflowRun {
        let mut run = WorkflowRun::new(workflow_label(workflow));
        self.record(&mut run, LogEntry::new(LogLevel::Error, rejection.to_string()));
        run.fail(rejection.to_string());
        self.publish(&run);
        run
    }

    /// Entry navigation, then every step in order. The caller races this
    /// whole future against the run deadline and cancellation.
    async fn drive<S: BrowserSession>(
        &self,
        run: &mut WorkflowRun,
        workflow: &Workflow,
        session: &S,
    ) -> Result<()> {
        self.navigate(run, session, &workflow.url).await?;
        for (index, step) in workflow.steps.iter().enumerate() {
            self.run_step(run, session, index, step).await?;
        }
        Ok(())
    }

    async fn navigate<S: BrowserSession>(
        &self,
        run: &mut WorkflowRun,
        session: &S,
        url: &str,
    ) -> Result<()> {
        with_timeout(
            self.config.execution.navigation_timeout_ms,
            "navigation",
            session.goto(url),
        )
        .await?;
        // Redirects may have moved the page off the allow list.
        let landed = session.current_url();
        self.guard.ensure_allowed(&landed)?;

        let kind = self.classifier.classify(&landed);
        self.record(
            run,
            LogEntry::new(LogLevel::Info, format!("opened {landed}"))
                .with_meta("pageKind", json!(kind)),
        );
        Ok(())
    }

    /// One step with its retry loop: transient failures get up to
    /// `step_retries` extra attempts with linearly growing backoff;
    /// anything else propagates immediately.
    async fn run_step<S: BrowserSession>(
        &self,
        run: &mut WorkflowRun,
        session: &S,
        index: usize,
        step: &WorkflowStep,
    ) -> Result<()> {
        let retries = self.config.execution.step_retries;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.attempt_step(run, session, index, step).await {
                Ok(()) => {
                    self.capture_step_screenshot(run, session, index, step.action)
                        .await;
                    self.record(
                        run,
                        LogEntry::new(
                            LogLevel::Info,
                            format!("step {index} {} succeeded", step.action),
                        )
                        .with_meta("step", json!(index))
                        .with_meta("action", json!(step.action.as_str()))
                        .with_meta("attempt", json!(attempt)),
                    );
                    return Ok(());
                }
                Err(step_error) if step_error.is_retryable() && attempt <= retries => {
                    self.record(
                        run,
                        LogEntry::new(
                            LogLevel::Warn,
                            format!(
                                "step {index} {} failed ({step_error}); retrying",
                                step.action
                            ),
                        )
                        .with_meta("step", json!(index))
                        .with_meta("attempt", json!(attempt)),
                    );
                    let backoff = self.config.execution.retry_backoff_ms * u64::from(attempt);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(step_error) => {
                    self.record(
                        run,
                        LogEntry::new(
                            LogLevel::Error,
                            format!("step {index} {} failed: {step_error}", step.action),
                        )
                        .with_meta("step", json!(index))
                        .with_meta("attempt", json!(attempt)),
                    );
                    return Err(step_error);
                }
            }
        }
    }

    async fn attempt_step<S: BrowserSession>(
        &self,
        run: &mut WorkflowRun,
        session: &S,
        index: usize,
        step: &WorkflowStep,
    ) -> Result<()> {
        let interaction_ms = self.config.execution.interaction_timeout_ms;
        match step.action {
            StepAction::Goto => {
                let target = required(step.value.as_deref(), index, "goto target")?;
                self.guard.ensure_allowed(target)?;
                self.navigate(run, session, target).await?;
            }
            StepAction::Click => {
                let selector = required(step.selector.as_deref(), index, "click selector")?;
                self.guard.ensure_allowed(&session.current_url())?;
                with_timeout(interaction_ms, "click", session.click(selector)).await?;
            }
            StepAction::Type => {
                let selector = required(step.selector.as_deref(), index, "type selector")?;
                let value = required(step.value.as_deref(), index, "type value")?;
                self.guard.ensure_allowed(&session.current_url())?;
                with_timeout(interaction_ms, "type", session.type_text(selector, value)).await?;
            }
            StepAction::Extract => {
                let selector = required(step.selector.as_deref(), index, "extract selector")?;
                self.guard.ensure_allowed(&session.current_url())?;
                let mode = ExtractMode::from_attribute(step.attribute.as_deref());
                let value =
                    with_timeout(interaction_ms, "extract", session.extract(selector, &mode))
                        .await?;
                run.push_extracted(ExtractedItem {
                    step: index,
                    selector: selector.to_string(),
                    attribute: step.attribute.clone(),
                    value,
                });
            }
            StepAction::Wait => {
                let raw = required(step.value.as_deref(), index, "wait duration")?;
                let requested = raw.trim().parse::<u64>().map_err(|_| {
                    PilotError::Validation(format!("step {index}: wait duration is not a number"))
                })?;
                let wait_ms = clamp_wait_ms(requested);
                if wait_ms != requested {
                    debug!(requested, wait_ms, "wait duration clamped");
                }
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            }
        }
        Ok(())
    }

    /// Best-effort capture after a successful step. A failed capture is
    /// logged and the run moves on.
    async fn capture_step_screenshot<S: BrowserSession>(
        &self,
        run: &mut WorkflowRun,
        session: &S,
        index: usize,
        action: StepAction,
    ) {
        if !self.config.screenshots.enabled {
            return;
        }
        let bytes = match session.screenshot().await {
            Ok(bytes) => bytes,
            Err(capture_error) => {
                self.record(
                    run,
                    LogEntry::new(
                        LogLevel::Warn,
                        format!("screenshot after step {index} failed: {capture_error}"),
                    ),
                );
                return;
            }
        };
        let file_name = screenshot::file_name(index, action);
        let path = match &self.config.screenshots.directory {
            Some(dir) => match screenshot::save(dir, &file_name, &bytes).await {
                Ok(path) => path,
                Err(write_error) => {
                    self.record(
                        run,
                        LogEntry::new(
                            LogLevel::Warn,
                            format!("screenshot write failed: {write_error}"),
                        ),
                    );
                    return;
                }
            },
            None => screenshot::to_data_uri(&bytes),
        };
        run.push_screenshot(ScreenshotRecord {
            step: index,
            action,
            file_name,
            path,
        });
    }

    /// When no extract step produced data, capture a page summary so the
    /// caller still gets something: title, headings, and a body preview.
    async fn fallback_extraction<S: BrowserSession>(
        &self,
        run: &mut WorkflowRun,
        session: &S,
        step: usize,
    ) {
        self.record(
            run,
            LogEntry::new(
                LogLevel::Info,
                "no extracted data; capturing page snapshot instead",
            ),
        );
        let probes = [
            ("title", ExtractMode::TextContent),
            ("h1", ExtractMode::InnerText),
            ("h2", ExtractMode::InnerText),
            ("h3", ExtractMode::InnerText),
        ];
        for (selector, mode) in probes {
            if let Ok(value) = session.extract(selector, &mode).await {
                let value = text::collapse_whitespace(&value);
                if !value.is_empty() {
                    run.push_extracted(ExtractedItem {
                        step,
                        selector: selector.to_string(),
                        attribute: None,
                        value,
                    });
                }
            }
        }
        if let Ok(body) = session.extract("body", &ExtractMode::InnerText).await {
            let preview = text::truncate(&text::collapse_whitespace(&body), BODY_PREVIEW_CHARS);
            if !preview.is_empty() {
                run.push_extracted(ExtractedItem {
                    step,
                    selector: "body".to_string(),
                    attribute: None,
                    value: preview,
                });
            }
        }
    }

    /// Appends to the run log, mirrors to tracing, and publishes the
    /// updated record. Progress is best-effort by construction.
    fn record(&self, run: &mut WorkflowRun, entry: LogEntry) {
        match entry.level {
            LogLevel::Info => info!(run_id = %run.id, "{}", entry.message),
            LogLevel::Warn => warn!(run_id = %run.id, "{}", entry.message),
            LogLevel::Error => error!(run_id = %run.id, "{}", entry.message),
        }
        run.push_log(entry);
        self.publish(run);
    }

    fn publish(&self, run: &WorkflowRun) {
        self.progress.publish(RunUpdate {
            run_id: run.id.clone(),
            status: run.status,
            logs: run.logs.clone(),
        });
    }

    async fn close_session<S: BrowserSession>(&self, session: &mut S, run_id: &str) {
        if let Err(close_error) = session.close().await {
            warn!(run_id, %close_error, "browser close failed");
        }
    }
}

fn workflow_label(workflow: &Workflow) -> String {
    workflow.id.clone().unwrap_or_else(|| "adhoc".to_string())
}

fn required<'a>(field: Option<&'a str>, index: usize, what: &str) -> Result<&'a str> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(PilotError::Validation(format!("step {index}: missing {what}"))),
    }
}

async fn with_timeout<T>(
    ms: u64,
    what: &str,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(Duration::from_millis(ms), operation).await {
        Ok(result) => result,
        Err(_) => Err(PilotError::ActionTimeout(format!("{what} exceeded {ms} ms"))),
    }
}
