//! Asynchronous retrieval of the telemetry CSV.
//!
//! The resource is read once; there is no retry and no timeout. Failures are
//! returned to the caller as [`HealthError::Fetch`].

use std::path::PathBuf;

use health_core::error::{HealthError, Result};

const FILE_SCHEME: &str = "file://";

/// Read the text behind `locator`.
///
/// Accepts a filesystem path or a `file://` URI. Any other scheme is rejected
/// with [`HealthError::UnsupportedLocator`].
pub async fn fetch_resource(locator: &str) -> Result<String> {
    let path = resolve_locator(locator)?;
    tracing::debug!("fetching {}", path.display());

    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| HealthError::Fetch {
            locator: locator.to_string(),
            source,
        })?;

    tracing::debug!("fetched {} bytes from {}", text.len(), locator);
    Ok(text)
}

/// Map a locator onto a local path.
pub fn resolve_locator(locator: &str) -> Result<PathBuf> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(HealthError::Config("empty resource locator".to_string()));
    }

    if let Some(rest) = strip_prefix_ignore_case(locator, FILE_SCHEME) {
        // file:///data/x.csv and file://localhost/data/x.csv name the same file.
        let rest = strip_prefix_ignore_case(rest, "localhost").unwrap_or(rest);
        if rest.is_empty() {
            return Err(HealthError::UnsupportedLocator(locator.to_string()));
        }
        return Ok(PathBuf::from(rest));
    }

    if locator.contains("://") {
        return Err(HealthError::UnsupportedLocator(locator.to_string()));
    }

    Ok(PathBuf::from(locator))
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(&s[prefix.len()..]),
        _ => None,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
