use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::browser::session::{BrowserSession, ExtractMode};
use crate::config::Config;
use crate::errors::{PilotError, Result};
use crate::types::ConsoleEntry;

const VISIBILITY_POLL_MS: u64 = 100;
const MISSING_SENTINEL: &str = "__pilot_missing__";

/// Console wrapper injected after every navigation. Keeps at most 500
/// entries so a chatty page cannot grow the buffer unbounded.
const CONSOLE_HOOK: &str = r#"
(function() {
    if (window.__pilotConsole) { return true; }
    window.__pilotConsole = [];
    for (const level of ['log', 'info', 'warn', 'error']) {
        const original = console[level];
        console[level] = function(...args) {
            try {
                window.__pilotConsole.push({ level: level, text: args.map(String).join(' ') });
                if (window.__pilotConsole.length > 500) { window.__pilotConsole.shift(); }
            } catch (e) {}
            return original.apply(console, args);
        };
    }
    return true;
})()
"#;

/// Live Chrome session over the DevTools protocol. One tab per session.
pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    element_wait_ms: u64,
}

impl ChromeSession {
    /// Launches Chrome with the configured viewport and flags and opens
    /// the working tab.
    pub fn launch(config: &Config) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.browser.viewport.width, config.browser.viewport.height
        );

        let user_agent_arg = config
            .browser
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        if config.browser.disable_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }

        for arg in &config.browser.args {
            args.push(OsStr::new(arg));
        }

        let idle_timeout = idle_browser_timeout(config.execution.max_execution_ms);

        let launch_options = LaunchOptions::default_builder()
            .headless(config.browser.headless)
            .idle_browser_timeout(idle_timeout)
            .args(args)
            .build()
            .map_err(|e| PilotError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| PilotError::LaunchFailed(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| PilotError::LaunchFailed(e.to_string()))?;

        // Element waits end just before the interaction deadline so a
        // missing element surfaces as ElementNotFound, not a timeout.
        let element_wait_ms = config
            .execution
            .interaction_timeout_ms
            .saturating_sub(500)
            .max(500);

        Ok(Self {
            browser: Some(browser),
            tab,
            element_wait_ms,
        })
    }

    fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| PilotError::ScriptFailed(e.to_string()))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    fn evaluate_string(&self, script: &str) -> Result<String> {
        Ok(self.evaluate(script)?.as_str().unwrap_or("").to_string())
    }

    async fn wait_for_visible(&self, selector: &str) -> Result<()> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector('{sel}');
                if (!el) {{ return false; }}
                const rect = el.getBoundingClientRect();
                const style = window.getComputedStyle(el);
                return rect.width > 0 && rect.height > 0
                    && style.visibility !== 'hidden' && style.display !== 'none';
            }})()"#,
            sel = js_quote(selector)
        );

        let deadline = Instant::now() + Duration::from_millis(self.element_wait_ms);
        loop {
            if matches!(self.evaluate(&script), Ok(Value::Bool(true))) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PilotError::ElementNotFound(format!(
                    "{} (not visible within {} ms)",
                    selector, self.element_wait_ms
                )));
            }
            sleep(Duration::from_millis(VISIBILITY_POLL_MS)).await;
        }
    }

    fn field_value(&self, selector: &str) -> Result<String> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector('{sel}');
                return el ? String(el.value ?? '') : '{missing}';
            }})()"#,
            sel = js_quote(selector),
            missing = MISSING_SENTINEL
        );
        self.evaluate_string(&script)
    }

    /// Assigns the value directly and fires the framework events typing
    /// would have produced.
    fn force_field_value(&self, selector: &str, text: &str) -> Result<String> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector('{sel}');
                if (!el) {{ return '{missing}'; }}
                el.value = '{value}';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return String(el.value ?? '');
            }})()"#,
            sel = js_quote(selector),
            value = js_quote(text),
            missing = MISSING_SENTINEL
        );
        self.evaluate_string(&script)
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn goto(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| PilotError::NavigationFailed(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| PilotError::NavigationFailed(e.to_string()))?;

        if let Err(error) = self.evaluate(CONSOLE_HOOK) {
            debug!(%error, "console hook injection failed; page logs will be missing");
        }
        Ok(())
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }

    async fn page_title(&self) -> Result<String> {
        self.evaluate_string("document.title")
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.wait_for_visible(selector).await?;

        let scroll = format!(
            r#"(function() {{
                const el = document.querySelector('{sel}');
                if (el) {{ el.scrollIntoView({{ block: 'center' }}); }}
                return true;
            }})()"#,
            sel = js_quote(selector)
        );
        if let Err(error) = self.evaluate(&scroll) {
            debug!(%error, selector, "scroll before click failed");
        }

        let element = self
            .tab
            .find_element(selector)
            .map_err(|e| PilotError::ElementNotFound(format!("{selector}: {e}")))?;
        element
            .click()
            .map_err(|e| PilotError::InteractionFailed(format!("click {selector}: {e}")))?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.wait_for_visible(selector).await?;

        let element = self
            .tab
            .find_element(selector)
            .map_err(|e| PilotError::ElementNotFound(format!("{selector}: {e}")))?;
        element
            .click()
            .map_err(|e| PilotError::InteractionFailed(format!("focus {selector}: {e}")))?;

        let clear = format!(
            r#"(function() {{
                const el = document.querySelector('{sel}');
                if (!el) {{ return '{missing}'; }}
                el.value = '';
                return '';
            }})()"#,
            sel = js_quote(selector),
            missing = MISSING_SENTINEL
        );
        if self.evaluate_string(&clear)? == MISSING_SENTINEL {
            return Err(PilotError::ElementNotFound(selector.to_string()));
        }

        element
            .type_into(text)
            .map_err(|e| PilotError::InteractionFailed(format!("type into {selector}: {e}")))?;

        // Key events can be swallowed by page scripts; verify the value
        // landed and fall back to direct assignment when it did not.
        if self.field_value(selector)? != text {
            let forced = self.force_field_value(selector, text)?;
            if forced != text {
                return Err(PilotError::InteractionFailed(format!(
                    "typed value did not stick for {selector}"
                )));
            }
        }
        Ok(())
    }

    async fn extract(&self, selector: &str, mode: &ExtractMode) -> Result<String> {
        let read = match mode {
            ExtractMode::InnerText => "String(el.innerText ?? '')".to_string(),
            ExtractMode::TextContent => "String(el.textContent ?? '')".to_string(),
            ExtractMode::Attribute(name) => format!(
                "(function(v) {{ return v === null ? '' : String(v); }})(el.getAttribute('{}'))",
                js_quote(name)
            ),
        };
        let script = format!(
            r#"(function() {{
                const el = document.querySelector('{sel}');
                if (!el) {{ return '{missing}'; }}
                return {read};
            }})()"#,
            sel = js_quote(selector),
            missing = MISSING_SENTINEL,
            read = read
        );

        let value = self.evaluate_string(&script)?;
        if value == MISSING_SENTINEL {
            return Err(PilotError::ElementNotFound(selector.to_string()));
        }
        Ok(value)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| PilotError::ScreenshotFailed(e.to_string()))
    }

    async fn page_html(&self) -> Result<String> {
        self.evaluate_string(
            "document.documentElement ? document.documentElement.outerHTML : ''",
        )
    }

    async fn console_logs(&self) -> Result<Vec<ConsoleEntry>> {
        let drained = self.evaluate_string(
            r#"(function() {
                const logs = window.__pilotConsole || [];
                window.__pilotConsole = [];
                return JSON.stringify(logs);
            })()"#,
        )?;
        if drained.is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&drained) {
            Ok(entries) => Ok(entries),
            Err(error) => {
                debug!(%error, "discarding unparseable console payload");
                Ok(Vec::new())
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.browser.take();
        Ok(())
    }
}

fn js_quote(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
}

/// The transport must outlive the longest possible run, including
/// unsanitized deadlines handed in by library callers.
fn idle_browser_timeout(max_execution_ms: u64) -> Duration {
    Duration::from_millis(max_execution_ms.saturating_add(60_000))
}
