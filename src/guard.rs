use tracing::debug;
use url::Url;

use crate::errors::{PilotError, Result};

/// Hostname allow-list checked before and after every navigation.
///
/// An empty list means unrestricted. Entries and candidate hostnames are
/// normalized the same way: lowercased, one leading `www.` stripped. A
/// hostname passes when it equals an entry exactly or sits under it as a
/// subdomain (`shop.example.com` under `example.com`). Malformed URLs fail
/// closed.
#[derive(Debug, Clone, Default)]
pub struct DomainGuard {
    allowed: Vec<String>,
}

impl DomainGuard {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = entries
            .into_iter()
            .filter_map(|entry| {
                let normalized = normalize_host(entry.as_ref());
                if normalized.is_empty() {
                    None
                } else {
                    Some(normalized)
                }
            })
            .collect();
        Self { allowed }
    }

    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn is_allowed(&self, url: &str) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        let host = match host_of(url) {
            Some(host) => host,
            None => {
                debug!(url, "blocking URL without a parseable hostname");
                return false;
            }
        };
        self.allowed
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    }

    pub fn ensure_allowed(&self, url: &str) -> Result<()> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(PilotError::DomainBlocked(url.to_string()))
        }
    }
}

fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(normalize_host)
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}
