use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use browser_pilot::healing::{selector_map_from_raw, HealingDiagnostics, RawSelectorEntry};
use browser_pilot::workflow::{JobRegistry, WorkflowExecutor};
use browser_pilot::{Config, ExecutionConfig, RunStatus, ScreenshotConfig, Workflow};

#[derive(Parser)]
#[command(name = "browser-pilot", version, about = "Self-healing browser workflow runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a workflow definition against a live browser
    Run {
        /// Path to the workflow JSON file
        workflow: PathBuf,
        /// Domain the run may touch; repeat for more. Empty means unrestricted
        #[arg(long = "allow")]
        allow: Vec<String>,
        /// Overall run deadline in milliseconds
        #[arg(long, default_value_t = 120_000)]
        max_ms: u64,
        /// Extra attempts per step after the first failure
        #[arg(long, default_value_t = 1)]
        retries: u32,
        /// Directory for step screenshots; omit to inline them as data URIs
        #[arg(long)]
        screenshot_dir: Option<PathBuf>,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },
    /// Diagnose selector drift from recorded snapshots
    Heal {
        /// Selector map JSON: exact selector -> { primary, fallbacks }
        selectors: PathBuf,
        /// HTML captured before the run
        before: PathBuf,
        /// HTML captured after the run
        after: PathBuf,
        /// HTML of the page as it stands now
        current: PathBuf,
        /// Fail when any selector stays unresolved
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Run {
            workflow,
            allow,
            max_ms,
            retries,
            screenshot_dir,
            headed,
        } => run_workflow(workflow, allow, max_ms, retries, screenshot_dir, headed).await,
        Command::Heal {
            selectors,
            before,
            after,
            current,
            strict,
        } => heal(selectors, before, after, current, strict),
    }
}

async fn run_workflow(
    path: PathBuf,
    allow: Vec<String>,
    max_ms: u64,
    retries: u32,
    screenshot_dir: Option<PathBuf>,
    headed: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading workflow {}", path.display()))?;
    let workflow: Workflow = serde_json::from_str(&raw).context("parsing workflow definition")?;

    let execution = ExecutionConfig {
        max_execution_ms: max_ms,
        step_retries: retries,
        allowed_domains: allow,
        ..ExecutionConfig::default()
    }
    .sanitized()?;

    let mut config = Config::default();
    config.execution = execution;
    config.browser.headless = !headed;
    config.screenshots = ScreenshotConfig {
        enabled: true,
        directory: screenshot_dir,
    };

    let executor = WorkflowExecutor::new(config, Arc::new(JobRegistry::new()));
    let run = executor.execute(&workflow).await;
    println!("{}", serde_json::to_string_pretty(&run)?);

    if run.status == RunStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

fn heal(
    selectors: PathBuf,
    before: PathBuf,
    after: PathBuf,
    current: PathBuf,
    strict: bool,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&selectors)
        .with_context(|| format!("reading selector map {}", selectors.display()))?;
    let raw_map: BTreeMap<String, RawSelectorEntry> =
        serde_json::from_str(&raw).context("parsing selector map")?;
    let map = selector_map_from_raw(raw_map);

    let before = read_snapshot(&before)?;
    let after = read_snapshot(&after)?;
    let current = read_snapshot(&current)?;

    let diagnostics = if strict {
        HealingDiagnostics::strict()
    } else {
        HealingDiagnostics::new()
    };
    let report = diagnostics.diagnose(&map, &before, &after, &current)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_snapshot(path: &PathBuf) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading snapshot {}", path.display()))
}
