//! URL and pattern parsing utilities for the matcher
//!
//! Candidate URLs are parsed with the `url` crate; patterns written as
//! `host/path` are split by hand since they carry no scheme.

use ::url::Url;

// =============================================================================
// Parsed URL
// =============================================================================

/// The parts of a candidate URL the matcher looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts<'a> {
    /// The URL exactly as supplied by the caller
    pub raw: &'a str,
    /// Lowercased host without a trailing dot, if the URL has one
    pub host: Option<String>,
    /// Port written in the URL; `None` when absent or the scheme default
    pub port: Option<u16>,
    /// Explicit port, or the scheme's default when there is one
    pub effective_port: Option<u16>,
    /// Path component, always starting with `/` for hierarchical URLs
    pub path: String,
}

impl<'a> UrlParts<'a> {
    /// Parse a candidate URL.
    pub fn parse(raw: &'a str) -> Result<Self, ::url::ParseError> {
        let parsed = Url::parse(raw)?;
        let host = parsed
            .host_str()
            .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
            .filter(|h| !h.is_empty());
        Ok(Self {
            raw,
            host,
            port: parsed.port(),
            effective_port: parsed.port_or_known_default(),
            path: parsed.path().to_string(),
        })
    }
}

/// Check if a pattern looks like a full URL rather than `host/path`.
#[inline]
pub fn has_scheme(pattern: &str) -> bool {
    match pattern.find("://") {
        Some(pos) => {
            pos > 0
                && pattern[..pos]
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.')
        }
        None => false,
    }
}

// =============================================================================
// Host Helpers
// =============================================================================

/// Strip one leading `www.` (case-insensitive).
#[inline]
pub fn strip_www(host: &str) -> &str {
    match host.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("www.") => &host[4..],
        _ => host,
    }
}

/// Split a `host/path` pattern into its host and path.
///
/// The path keeps its leading `/`. Returns `None` when the pattern has no
/// path segment at all.
pub fn split_host_path(pattern: &str) -> Option<(&str, &str)> {
    let slash = pattern.find('/')?;
    Some((&pattern[..slash], &pattern[slash..]))
}

/// Check whether `path` falls under `prefix`.
///
/// A prefix with a trailing `/` also matches the same path without it, so
/// `/maps/` covers `/maps`.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    if path.starts_with(prefix) {
        return true;
    }
    match prefix.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => path == trimmed,
        _ => false,
    }
}
