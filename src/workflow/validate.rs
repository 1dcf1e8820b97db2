use url::Url;

use crate::errors::{PilotError, Result};
use crate::types::{StepAction, Workflow, WorkflowStep};

pub const MAX_STEPS: usize = 120;
pub const MAX_SELECTOR_LEN: usize = 500;
pub const MAX_VALUE_LEN: usize = 4_000;
pub const MAX_ATTRIBUTE_LEN: usize = 120;
pub const MIN_WAIT_MS: u64 = 200;
pub const MAX_WAIT_MS: u64 = 30_000;

/// Checks a submitted workflow before anything touches a browser.
/// Validation failures are terminal; the executor never retries them.
pub fn validate_workflow(workflow: &Workflow) -> Result<()> {
    if workflow.url.trim().is_empty() {
        return Err(PilotError::Validation("workflow url is required".into()));
    }
    if Url::parse(&workflow.url).is_err() {
        return Err(PilotError::Validation(format!(
            "workflow url is not a valid URL: {}",
            workflow.url
        )));
    }
    if workflow.steps.is_empty() {
        return Err(PilotError::Validation(
            "workflow must contain at least one step".into(),
        ));
    }
    if workflow.steps.len() > MAX_STEPS {
        return Err(PilotError::Validation(format!(
            "workflow has {} steps; the maximum is {}",
            workflow.steps.len(),
            MAX_STEPS
        )));
    }
    for (index, step) in workflow.steps.iter().enumerate() {
        validate_step(index, step)?;
    }
    Ok(())
}

fn validate_step(index: usize, step: &WorkflowStep) -> Result<()> {
    if let Some(selector) = &step.selector {
        if selector.len() > MAX_SELECTOR_LEN {
            return Err(step_error(index, format!(
                "selector exceeds {MAX_SELECTOR_LEN} characters"
            )));
        }
    }
    if let Some(value) = &step.value {
        if value.len() > MAX_VALUE_LEN {
            return Err(step_error(index, format!(
                "value exceeds {MAX_VALUE_LEN} characters"
            )));
        }
    }
    if let Some(attribute) = &step.attribute {
        if attribute.len() > MAX_ATTRIBUTE_LEN {
            return Err(step_error(index, format!(
                "attribute exceeds {MAX_ATTRIBUTE_LEN} characters"
            )));
        }
    }

    match step.action {
        StepAction::Goto => {
            let value = require(index, step.value.as_deref(), "goto requires a target url")?;
            if Url::parse(value).is_err() {
                return Err(step_error(index, format!("goto target is not a valid URL: {value}")));
            }
        }
        StepAction::Click => {
            require(index, step.selector.as_deref(), "click requires a selector")?;
        }
        StepAction::Type => {
            require(index, step.selector.as_deref(), "type requires a selector")?;
            require(index, step.value.as_deref(), "type requires a value")?;
        }
        StepAction::Extract => {
            require(index, step.selector.as_deref(), "extract requires a selector")?;
        }
        StepAction::Wait => {
            let value = require(index, step.value.as_deref(), "wait requires a duration in ms")?;
            if value.trim().parse::<u64>().is_err() {
                return Err(step_error(index, format!(
                    "wait duration is not a number: {value}"
                )));
            }
        }
    }
    Ok(())
}

fn require<'a>(index: usize, field: Option<&'a str>, message: &str) -> Result<&'a str> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(step_error(index, message.to_string())),
    }
}

fn step_error(index: usize, message: String) -> PilotError {
    PilotError::Validation(format!("step {index}: {message}"))
}

/// Wait durations are clamped, never rejected.
pub fn clamp_wait_ms(requested: u64) -> u64 {
    requested.clamp(MIN_WAIT_MS, MAX_WAIT_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_workflow() -> Workflow {
        Workflow::new(
            "https://example.com",
            vec![
                WorkflowStep::goto("https://example.com/search"),
                WorkflowStep::type_into("#q", "rust"),
                WorkflowStep::click("button[type='submit']"),
                WorkflowStep::extract("h1"),
                WorkflowStep::wait(500),
            ],
        )
    }

    #[test]
    fn accepts_a_complete_workflow() {
        assert!(validate_workflow(&valid_workflow()).is_ok());
    }

    #[test]
    fn rejects_missing_or_invalid_url() {
        let mut workflow = valid_workflow();
        workflow.url = String::new();
        assert!(matches!(
            validate_workflow(&workflow),
            Err(PilotError::Validation(_))
        ));

        workflow.url = "not a url".to_string();
        assert!(matches!(
            validate_workflow(&workflow),
            Err(PilotError::Validation(_))
        ));
    }

    #[test]
    fn rejects_empty_and_oversized_step_lists() {
        let mut workflow = valid_workflow();
        workflow.steps.clear();
        assert!(validate_workflow(&workflow).is_err());

        workflow.steps = (0..MAX_STEPS + 1).map(|_| WorkflowStep::wait(300)).collect();
        assert!(validate_workflow(&workflow).is_err());
    }

    #[test]
    fn rejects_steps_missing_required_fields() {
        let mut workflow = valid_workflow();
        workflow.steps[2].selector = None;
        let error = validate_workflow(&workflow).unwrap_err();
        assert!(error.to_string().contains("step 2"));

        let mut workflow = valid_workflow();
        workflow.steps[4].value = Some("soon".to_string());
        assert!(validate_workflow(&workflow).is_err());

        let mut workflow = valid_workflow();
        workflow.steps[0].value = Some("nowhere".to_string());
        assert!(validate_workflow(&workflow).is_err());
    }

    #[test]
    fn rejects_oversized_fields() {
        let mut workflow = valid_workflow();
        workflow.steps[1].selector = Some("x".repeat(MAX_SELECTOR_LEN + 1));
        assert!(validate_workflow(&workflow).is_err());

        let mut workflow = valid_workflow();
        workflow.steps[1].value = Some("x".repeat(MAX_VALUE_LEN + 1));
        assert!(validate_workflow(&workflow).is_err());

        let mut workflow = valid_workflow();
        workflow.steps[3].attribute = Some("x".repeat(MAX_ATTRIBUTE_LEN + 1));
        assert!(validate_workflow(&workflow).is_err());
    }

    #[test]
    fn wait_durations_clamp_to_the_allowed_band() {
        assert_eq!(clamp_wait_ms(0), MIN_WAIT_MS);
        assert_eq!(clamp_wait_ms(1_000), 1_000);
        assert_eq!(clamp_wait_ms(90_000), MAX_WAIT_MS);
    }
}
