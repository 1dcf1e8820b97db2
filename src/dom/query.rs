use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};

use crate::errors::{PilotError, Result};

/// One element returned by a snapshot query.
#[derive(Debug, Clone)]
pub struct QueriedElement {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub text: String,
    pub attributes: HashMap<String, String>,
}

/// Querying seam over a parsed snapshot. The resolver only speaks this
/// trait, so the HTML backend can be swapped without touching healing
/// logic.
pub trait DomQueryable {
    /// All elements matching `selector`, in document order.
    ///
    /// `InvalidSelector` means the backend cannot evaluate the syntax
    /// (e.g. a text-match pseudo-selector); callers treat that as "skip
    /// this candidate", never as a hard failure. An empty vec means the
    /// selector parsed but matched nothing.
    fn query(&self, selector: &str) -> Result<Vec<QueriedElement>>;
}

/// `scraper`-backed snapshot.
pub struct ScraperDom {
    document: Html,
}

impl ScraperDom {
    /// Parses an HTML snapshot. HTML5 parsing is total, so the only
    /// unavailable input is an empty or whitespace-only string.
    pub fn parse(html: &str) -> Result<Self> {
        if html.trim().is_empty() {
            return Err(PilotError::SnapshotUnavailable);
        }
        Ok(Self {
            document: Html::parse_document(html),
        })
    }

    pub(crate) fn document(&self) -> &Html {
        &self.document
    }
}

impl DomQueryable for ScraperDom {
    fn query(&self, selector: &str) -> Result<Vec<QueriedElement>> {
        let parsed = Selector::parse(selector)
            .map_err(|_| PilotError::InvalidSelector(selector.to_string()))?;
        Ok(self
            .document
            .select(&parsed)
            .map(|element| element_from(&element))
            .collect())
    }
}

fn element_from(element: &ElementRef<'_>) -> QueriedElement {
    let value = element.value();
    QueriedElement {
        tag: value.name().to_ascii_lowercase(),
        id: value.id().map(str::to_string),
        classes: value.classes().map(str::to_string).collect(),
        text: element.text().collect::<Vec<_>>().join(" "),
        attributes: value
            .attrs()
            .map(|(name, val)| (name.to_string(), val.to_string()))
            .collect(),
    }
}
