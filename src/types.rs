use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Goto,
    Click,
    Type,
    Extract,
    Wait,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::Goto => "goto",
            StepAction::Click => "click",
            StepAction::Type => "type",
            StepAction::Extract => "extract",
            StepAction::Wait => "wait",
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic browser action. Field requirements depend on the action and
/// are enforced by `workflow::validate` before execution starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub action: StepAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl WorkflowStep {
    pub fn goto(url: impl Into<String>) -> Self {
        Self {
            action: StepAction::Goto,
            selector: None,
            value: Some(url.into()),
            attribute: None,
        }
    }

    pub fn click(selector: impl Into<String>) -> Self {
        Self {
            action: StepAction::Click,
            selector: Some(selector.into()),
            value: None,
            attribute: None,
        }
    }

    pub fn type_into(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            action: StepAction::Type,
            selector: Some(selector.into()),
            value: Some(value.into()),
            attribute: None,
        }
    }

    pub fn extract(selector: impl Into<String>) -> Self {
        Self {
            action: StepAction::Extract,
            selector: Some(selector.into()),
            value: None,
            attribute: None,
        }
    }

    pub fn extract_attr(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            action: StepAction::Extract,
            selector: Some(selector.into()),
            value: None,
            attribute: Some(attribute.into()),
        }
    }

    pub fn wait(ms: u64) -> Self {
        Self {
            action: StepAction::Wait,
            selector: None,
            value: Some(ms.to_string()),
            attribute: None,
        }
    }
}

/// A submitted workflow: entry URL plus an ordered list of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub url: String,
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn new(url: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            id: None,
            url: url.into(),
            steps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            level,
            message: message.into(),
            meta: Map::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRecord {
    pub step: usize,
    pub action: StepAction,
    pub file_name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedItem {
    pub step: usize,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub level: String,
    pub text: String,
}

/// The run record: append-only while running, terminal once `completed`
/// or `failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: String,
    pub workflow_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub logs: Vec<LogEntry>,
    pub screenshots: Vec<ScreenshotRecord>,
    pub console_logs: Vec<ConsoleEntry>,
    pub extracted_data: Vec<ExtractedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowRun {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            status: RunStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            logs: Vec::new(),
            screenshots: Vec::new(),
            console_logs: Vec::new(),
            extracted_data: Vec::new(),
            error: None,
        }
    }

    pub fn start(&mut self) {
        if self.status == RunStatus::Pending {
            self.status = RunStatus::Running;
            self.started_at = Utc::now();
        }
    }

    pub fn complete(&mut self) {
        if !self.status.is_terminal() {
            self.status = RunStatus::Completed;
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = RunStatus::Failed;
            self.completed_at = Some(Utc::now());
            self.error = Some(error.into());
        }
    }

    pub fn push_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
    }

    pub fn push_screenshot(&mut self, record: ScreenshotRecord) {
        self.screenshots.push(record);
    }

    pub fn push_extracted(&mut self, item: ExtractedItem) {
        self.extracted_data.push(item);
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| done.signed_duration_since(self.started_at).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_lifecycle_is_terminal_on_completion() {
        let mut run = WorkflowRun::new("wf-1");
        assert_eq!(run.status, RunStatus::Pending);
        run.start();
        assert_eq!(run.status, RunStatus::Running);
        run.complete();
        assert_eq!(run.status, RunStatus::Completed);

        run.fail("too late");
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.error.is_none());
    }

    #[test]
    fn failure_records_the_error() {
        let mut run = WorkflowRun::new("wf-2");
        run.start();
        run.fail("element not found: #q");
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error.as_deref(), Some("element not found: #q"));
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn step_action_round_trips_lowercase() {
        let json = serde_json::to_string(&StepAction::Goto).unwrap();
        assert_eq!(json, "\"goto\"");
        let back: StepAction = serde_json::from_str("\"extract\"").unwrap();
        assert_eq!(back, StepAction::Extract);
    }

    #[test]
    fn workflow_step_deserializes_sparse_fields() {
        let step: WorkflowStep =
            serde_json::from_str(r##"{"action":"click","selector":"#go"}"##).unwrap();
        assert_eq!(step.action, StepAction::Click);
        assert_eq!(step.selector.as_deref(), Some("#go"));
        assert!(step.value.is_none());
    }

    #[test]
    fn log_entry_meta_flattens_into_the_record() {
        let entry = LogEntry::new(LogLevel::Info, "navigated")
            .with_meta("step", serde_json::json!(2));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["message"], "navigated");
        assert_eq!(json["step"], 2);
    }
}
