use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use browser_pilot::testing::FakeBrowser;
use browser_pilot::types::{RunStatus, Workflow, WorkflowStep};
use browser_pilot::workflow::{JobRegistry, WorkflowExecutor};
use browser_pilot::Config;

fn test_config(screenshot_dir: &Path, domains: &[&str]) -> Config {
    let mut config = Config::default();
    config.execution.allowed_domains = domains.iter().map(|d| d.to_string()).collect();
    config.execution.retry_backoff_ms = 10;
    config.screenshots.directory = Some(screenshot_dir.to_path_buf());
    config
}

fn executor(config: Config) -> WorkflowExecutor {
    WorkflowExecutor::new(config, Arc::new(JobRegistry::new()))
}

#[tokio::test]
async fn completes_a_search_workflow_end_to_end() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new()
        .with_element("#q", "")
        .with_element("button.search", "Search")
        .with_element("h1", "Results for boots")
        .with_attr("a.next", "href", "/results?page=2");
    let probe = fake.probe();

    let mut workflow = Workflow::new(
        "https://shop.test/",
        vec![
            WorkflowStep::type_into("#q", "boots"),
            WorkflowStep::click("button.search"),
            WorkflowStep::extract("h1"),
            WorkflowStep::extract_attr("a.next", "href"),
        ],
    );
    workflow.id = Some("search-smoke".to_string());

    let executor = executor(test_config(dir.path(), &["shop.test"]));
    let run = executor.execute_with(fake, &workflow).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.workflow_id, "search-smoke");
    assert!(run.error.is_none());
    assert!(run.completed_at.is_some());

    assert_eq!(probe.typed(), vec![("#q".to_string(), "boots".to_string())]);
    assert_eq!(probe.clicked(), vec!["button.search"]);
    assert!(probe.is_closed());

    assert_eq!(run.extracted_data.len(), 2);
    assert_eq!(run.extracted_data[0].value, "Results for boots");
    assert_eq!(run.extracted_data[0].step, 2);
    assert_eq!(run.extracted_data[1].value, "/results?page=2");
    assert_eq!(run.extracted_data[1].attribute.as_deref(), Some("href"));

    assert_eq!(run.screenshots.len(), 4);
    for (index, shot) in run.screenshots.iter().enumerate() {
        assert_eq!(shot.step, index);
        assert!(dir.path().join(&shot.file_name).exists());
    }

    assert!(executor.registry().is_empty().await);
}

#[tokio::test]
async fn goto_type_click_flow_takes_one_screenshot_per_step() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new()
        .with_element("#q", "")
        .with_element("button.go", "Search");
    let probe = fake.probe();

    let workflow = Workflow::new(
        "https://shop.test/",
        vec![
            WorkflowStep::goto("https://shop.test/search"),
            WorkflowStep::type_into("#q", "boots"),
            WorkflowStep::click("button.go"),
        ],
    );

    let executor = executor(test_config(dir.path(), &["shop.test"]));
    let run = executor.execute_with(fake, &workflow).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.error.is_none());

    assert_eq!(
        probe.visited(),
        vec!["https://shop.test/", "https://shop.test/search"]
    );
    assert_eq!(probe.typed(), vec![("#q".to_string(), "boots".to_string())]);
    assert_eq!(probe.clicked(), vec!["button.go"]);
    assert!(probe.is_closed());

    assert_eq!(run.screenshots.len(), 3);
    for (index, shot) in run.screenshots.iter().enumerate() {
        assert_eq!(shot.step, index);
        assert!(dir.path().join(&shot.file_name).exists());
    }

    let nav_log = run
        .logs
        .iter()
        .find(|entry| entry.message.contains("opened https://shop.test/search"))
        .expect("goto navigation should be logged");
    assert_eq!(nav_log.meta["pageKind"], "search_results");

    assert!(executor.registry().is_empty().await);
}

#[tokio::test]
async fn transient_misses_are_retried_until_they_succeed() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new()
        .with_element("#flaky", "Go")
        .with_element("h1", "Done")
        .with_failures("#flaky", 1);
    let probe = fake.probe();

    let workflow = Workflow::new(
        "https://shop.test/",
        vec![WorkflowStep::click("#flaky"), WorkflowStep::extract("h1")],
    );

    let run = executor(test_config(dir.path(), &["shop.test"]))
        .execute_with(fake, &workflow)
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(probe.clicked(), vec!["#flaky"]);

    let retry_logs = run
        .logs
        .iter()
        .filter(|entry| entry.message.contains("retrying"))
        .count();
    assert_eq!(retry_logs, 1);
}

#[tokio::test]
async fn exhausted_retries_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new()
        .with_element("#flaky", "Go")
        .with_failures("#flaky", 5);
    let probe = fake.probe();

    let workflow = Workflow::new("https://shop.test/", vec![WorkflowStep::click("#flaky")]);

    let mut config = test_config(dir.path(), &["shop.test"]);
    config.execution.step_retries = 2;
    let run = executor(config).execute_with(fake, &workflow).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap_or("").contains("Element not found"));
    assert!(probe.clicked().is_empty());

    let retry_logs = run
        .logs
        .iter()
        .filter(|entry| entry.message.contains("retrying"))
        .count();
    assert_eq!(retry_logs, 2);
    assert!(probe.is_closed());
}

#[tokio::test]
async fn deadline_overrun_fails_the_run_and_still_closes_the_browser() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new().with_hang("#slow");
    let probe = fake.probe();

    let workflow = Workflow::new("https://shop.test/", vec![WorkflowStep::click("#slow")]);

    let mut config = test_config(dir.path(), &["shop.test"]);
    config.execution.max_execution_ms = 300;
    config.execution.interaction_timeout_ms = 60_000;

    let executor = executor(config);
    let run = executor.execute_with(fake, &workflow).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run
        .error
        .as_deref()
        .unwrap_or("")
        .contains("execution deadline"));
    assert!(probe.is_closed());
    assert!(executor.registry().is_empty().await);
}

#[tokio::test]
async fn redirects_off_the_allow_list_are_blocked_without_retries() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new().with_redirect("https://shop.test/", "https://evil.test/landing");
    let probe = fake.probe();

    let workflow = Workflow::new("https://shop.test/", vec![WorkflowStep::wait(200)]);

    let run = executor(test_config(dir.path(), &["shop.test"]))
        .execute_with(fake, &workflow)
        .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap_or("").contains("Domain not allowed"));
    assert_eq!(
        run.logs
            .iter()
            .filter(|entry| entry.message.contains("retrying"))
            .count(),
        0
    );
    assert!(probe.is_closed());
}

#[tokio::test]
async fn goto_steps_off_the_allow_list_fail_before_navigating() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new();
    let probe = fake.probe();

    let workflow = Workflow::new(
        "https://shop.test/",
        vec![WorkflowStep::goto("https://evil.test/phish")],
    );

    let run = executor(test_config(dir.path(), &["shop.test"]))
        .execute_with(fake, &workflow)
        .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap_or("").contains("Domain not allowed"));

    // The entry navigation landed; the blocked target was never requested.
    assert_eq!(probe.visited(), vec!["https://shop.test/"]);
    assert_eq!(probe.screenshot_count(), 0);
    assert_eq!(
        run.logs
            .iter()
            .filter(|entry| entry.message.contains("retrying"))
            .count(),
        0
    );
    assert!(probe.is_closed());
}

#[tokio::test]
async fn runs_without_extract_steps_fall_back_to_a_page_snapshot() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new()
        .with_title("Boots | Shop")
        .with_element("h1", "New arrivals")
        .with_element("body", "New arrivals  this\nseason   with free shipping");

    let workflow = Workflow::new("https://shop.test/", vec![WorkflowStep::wait(200)]);

    let run = executor(test_config(dir.path(), &["shop.test"]))
        .execute_with(fake, &workflow)
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert!(!run.extracted_data.is_empty());

    let by_selector = |selector: &str| {
        run.extracted_data
            .iter()
            .find(|item| item.selector == selector)
            .map(|item| item.value.clone())
    };
    assert_eq!(by_selector("title").as_deref(), Some("Boots | Shop"));
    assert_eq!(by_selector("h1").as_deref(), Some("New arrivals"));
    assert_eq!(
        by_selector("body").as_deref(),
        Some("New arrivals this season with free shipping")
    );
    // Snapshot items carry the index just past the final step.
    assert!(run.extracted_data.iter().all(|item| item.step == 1));
}

#[tokio::test]
async fn invalid_workflows_fail_before_touching_a_page() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new();
    let probe = fake.probe();

    let workflow = Workflow::new("https://shop.test/", Vec::new());

    let executor = executor(test_config(dir.path(), &["shop.test"]));
    let run = executor.execute_with(fake, &workflow).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap_or("").contains("Validation"));
    assert!(probe.visited().is_empty());
    assert!(probe.is_closed());
    assert!(executor.registry().is_empty().await);
}

#[tokio::test]
async fn progress_subscribers_see_the_run_through_to_completion() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new().with_element("h1", "Hello");

    let workflow = Workflow::new("https://shop.test/", vec![WorkflowStep::extract("h1")]);

    let executor = executor(test_config(dir.path(), &["shop.test"]));
    let mut updates = executor.progress().subscribe();

    let run = executor.execute_with(fake, &workflow).await;
    assert_eq!(run.status, RunStatus::Completed);

    let mut seen = Vec::new();
    while let Ok(update) = updates.try_recv() {
        seen.push(update);
    }
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|update| update.run_id == run.id));
    assert_eq!(seen.last().unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn console_output_is_drained_into_the_run_record() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new()
        .with_element("h1", "Hello")
        .with_console("warn", "deprecated API")
        .with_console("error", "uncaught TypeError");

    let workflow = Workflow::new("https://shop.test/", vec![WorkflowStep::extract("h1")]);

    let run = executor(test_config(dir.path(), &["shop.test"]))
        .execute_with(fake, &workflow)
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.console_logs.len(), 2);
    assert_eq!(run.console_logs[0].level, "warn");
    assert_eq!(run.console_logs[0].text, "deprecated API");
    assert_eq!(run.console_logs[1].level, "error");
    assert_eq!(run.console_logs[1].text, "uncaught TypeError");
}

#[tokio::test]
async fn cancelling_through_the_registry_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let fake = FakeBrowser::new().with_hang("#slow");
    let probe = fake.probe();

    let workflow = Workflow::new("https://shop.test/", vec![WorkflowStep::click("#slow")]);

    let mut config = test_config(dir.path(), &["shop.test"]);
    config.execution.max_execution_ms = 60_000;
    config.execution.interaction_timeout_ms = 60_000;

    let registry = Arc::new(JobRegistry::new());
    let executor = Arc::new(WorkflowExecutor::new(config, Arc::clone(&registry)));

    let task = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.execute_with(fake, &workflow).await })
    };

    let mut run_id = None;
    for _ in 0..100 {
        let active = registry.active().await;
        if let Some(handle) = active.first() {
            run_id = Some(handle.run_id.clone());
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let run_id = run_id.expect("run should register itself");
    assert!(registry.cancel(&run_id).await);

    let run = task.await.expect("executor task should not panic");
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap_or("").contains("cancelled"));
    assert!(probe.is_closed());
    assert!(registry.is_empty().await);
}
