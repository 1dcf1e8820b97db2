//! Deterministic in-memory session for exercising the executor without a
//! browser. Always compiled so downstream crates can script failures in
//! their own tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::browser::{BrowserSession, ExtractMode};
use crate::errors::{PilotError, Result};
use crate::types::ConsoleEntry;

#[derive(Debug, Default, Clone)]
struct FakeElement {
    text: String,
    attributes: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct FakeState {
    current_url: Mutex<String>,
    visited: Mutex<Vec<String>>,
    clicked: Mutex<Vec<String>>,
    typed: Mutex<Vec<(String, String)>>,
    screenshots: AtomicUsize,
    closed: AtomicBool,
}

/// Scriptable [`BrowserSession`] backed by plain maps. Interactions are
/// recorded on shared state so a [`FakeProbe`] can assert on them after
/// the session has been consumed by the executor.
pub struct FakeBrowser {
    elements: HashMap<String, FakeElement>,
    redirects: HashMap<String, String>,
    hangs: HashSet<String>,
    failures: Mutex<HashMap<String, usize>>,
    console: Mutex<Vec<ConsoleEntry>>,
    title: String,
    html: String,
    state: Arc<FakeState>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        let state = FakeState {
            current_url: Mutex::new("about:blank".to_string()),
            ..FakeState::default()
        };
        Self {
            elements: HashMap::new(),
            redirects: HashMap::new(),
            hangs: HashSet::new(),
            failures: Mutex::new(HashMap::new()),
            console: Mutex::new(Vec::new()),
            title: "Fake Page".to_string(),
            html: "<html><head><title>Fake Page</title></head><body></body></html>".to_string(),
            state: Arc::new(state),
        }
    }

    /// Registers an element with rendered text. The same entry answers
    /// clicks, typing, and extraction for that selector.
    pub fn with_element(mut self, selector: &str, text: &str) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .text = text.to_string();
        self
    }

    pub fn with_attr(mut self, selector: &str, name: &str, value: &str) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .attributes
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self.elements.entry("title".to_string()).or_default().text = title.to_string();
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    /// Navigations to `from` land on `to`, like an HTTP redirect.
    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// Interactions with `selector` never resolve.
    pub fn with_hang(mut self, selector: &str) -> Self {
        self.hangs.insert(selector.to_string());
        self
    }

    /// The first `count` interactions with `selector` fail as an element
    /// miss, then the selector behaves normally.
    pub fn with_failures(self, selector: &str, count: usize) -> Self {
        lock(&self.failures).insert(selector.to_string(), count);
        self
    }

    pub fn with_console(self, level: &str, text: &str) -> Self {
        lock(&self.console).push(ConsoleEntry {
            level: level.to_string(),
            text: text.to_string(),
        });
        self
    }

    /// Handle for asserting on interactions after the executor has taken
    /// ownership of the session.
    pub fn probe(&self) -> FakeProbe {
        FakeProbe {
            state: Arc::clone(&self.state),
        }
    }

    async fn interact(&self, selector: &str) -> Result<()> {
        if self.hangs.contains(selector) {
            std::future::pending::<()>().await;
        }
        let mut failures = lock(&self.failures);
        if let Some(remaining) = failures.get_mut(selector) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PilotError::ElementNotFound(format!(
                    "{selector} (scripted miss)"
                )));
            }
        }
        Ok(())
    }
}

impl Default for FakeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn goto(&self, url: &str) -> Result<()> {
        lock(&self.state.visited).push(url.to_string());
        let landed = self
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        *lock(&self.state.current_url) = landed;
        Ok(())
    }

    fn current_url(&self) -> String {
        lock(&self.state.current_url).clone()
    }

    async fn page_title(&self) -> Result<String> {
        Ok(self.title.clone())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.interact(selector).await?;
        if !self.elements.contains_key(selector) {
            return Err(PilotError::ElementNotFound(selector.to_string()));
        }
        lock(&self.state.clicked).push(selector.to_string());
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.interact(selector).await?;
        if !self.elements.contains_key(selector) {
            return Err(PilotError::ElementNotFound(selector.to_string()));
        }
        lock(&self.state.typed).push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn extract(&self, selector: &str, mode: &ExtractMode) -> Result<String> {
        self.interact(selector).await?;
        let element = self
            .elements
            .get(selector)
            .ok_or_else(|| PilotError::ElementNotFound(selector.to_string()))?;
        Ok(match mode {
            ExtractMode::InnerText | ExtractMode::TextContent => element.text.clone(),
            ExtractMode::Attribute(name) => {
                element.attributes.get(name).cloned().unwrap_or_default()
            }
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.state.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn page_html(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn console_logs(&self) -> Result<Vec<ConsoleEntry>> {
        Ok(std::mem::take(&mut *lock(&self.console)))
    }

    async fn close(&mut self) -> Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Read side of a [`FakeBrowser`]'s shared state.
#[derive(Debug, Clone)]
pub struct FakeProbe {
    state: Arc<FakeState>,
}

impl FakeProbe {
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn current_url(&self) -> String {
        lock(&self.state.current_url).clone()
    }

    pub fn visited(&self) -> Vec<String> {
        lock(&self.state.visited).clone()
    }

    pub fn clicked(&self) -> Vec<String> {
        lock(&self.state.clicked).clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        lock(&self.state.typed).clone()
    }

    pub fn screenshot_count(&self) -> usize {
        self.state.screenshots.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
