use async_trait::async_trait;

use crate::errors::Result;
use crate::types::ConsoleEntry;

/// What to read from a matched element during an extract step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractMode {
    InnerText,
    TextContent,
    Attribute(String),
}

impl ExtractMode {
    /// Maps a step's `attribute` field onto a mode. Absent means rendered
    /// text; the two DOM text properties are addressed by their DOM names
    /// and anything else is treated as an attribute name.
    pub fn from_attribute(attribute: Option<&str>) -> Self {
        match attribute {
            None => Self::InnerText,
            Some("innerText") => Self::InnerText,
            Some("textContent") => Self::TextContent,
            Some(name) => Self::Attribute(name.to_string()),
        }
    }
}

/// Driver-agnostic page handle. The executor runs entirely against this
/// trait so workflows can execute on a real browser or an in-memory fake.
///
/// Implementations own their page state; `close` must be safe to call
/// once and must release the underlying driver.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    /// URL the session currently points at. Implementations should fall
    /// back to the last requested URL if the driver cannot report one.
    fn current_url(&self) -> String;

    async fn page_title(&self) -> Result<String>;

    /// Waits for the element to become visible, then clicks it.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Clears the field, types `text`, and verifies the value landed.
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    /// Reads text or an attribute from the first element matching
    /// `selector`.
    async fn extract(&self, selector: &str, mode: &ExtractMode) -> Result<String>;

    /// Captures the current viewport as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Full serialized document, used for drift snapshots.
    async fn page_html(&self) -> Result<String>;

    /// Drains console messages recorded since the last call.
    async fn console_logs(&self) -> Result<Vec<ConsoleEntry>>;

    async fn close(&mut self) -> Result<()>;
}
