//! Pattern Matcher
//!
//! Decides whether a URL is covered by one pattern under one pattern type.
//! Matching never fails from the caller's point of view: anything that
//! cannot be evaluated is logged and treated as no match.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use regex::Regex;

use crate::psl::{normalize_host, registrable_domain};
use crate::types::PatternType;
use crate::url::{has_scheme, path_has_prefix, split_host_path, strip_www, UrlParts};

/// Compiled patterns kept before the regex cache is emptied.
const REGEX_CACHE_CAPACITY: usize = 1024;

static REGEX_CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();

/// Reasons a pattern could not be evaluated against a URL.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: ::url::ParseError,
    },
    #[error("URL '{0}' has no host")]
    MissingHost(String),
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("unknown pattern type '{0}'")]
    UnknownPatternType(String),
}

// =============================================================================
// Entry Points
// =============================================================================

/// Check whether `url` is matched by `pattern` under `pattern_type`.
pub fn matches(url: &str, pattern: &str, pattern_type: PatternType) -> bool {
    log_failure(pattern_type, evaluate(url, pattern, pattern_type))
}

/// Like [`matches`], for a URL that has already been parsed.
pub fn matches_parts(parts: &UrlParts<'_>, pattern: &str, pattern_type: PatternType) -> bool {
    log_failure(pattern_type, evaluate_parts(parts, pattern, pattern_type))
}

/// Like [`matches`], with the pattern type given by its wire name.
pub fn matches_raw(url: &str, pattern: &str, pattern_type: &str) -> bool {
    match pattern_type.parse::<PatternType>() {
        Ok(t) => matches(url, pattern, t),
        Err(_) => {
            log::warn!("{}", MatchError::UnknownPatternType(pattern_type.to_string()));
            false
        }
    }
}

/// Evaluate a pattern, reporting why evaluation was impossible.
pub fn evaluate(url: &str, pattern: &str, pattern_type: PatternType) -> Result<bool, MatchError> {
    let parts = parse_url(url)?;
    evaluate_parts(&parts, pattern, pattern_type)
}

/// Evaluate a pattern against an already parsed URL.
pub fn evaluate_parts(
    parts: &UrlParts<'_>,
    pattern: &str,
    pattern_type: PatternType,
) -> Result<bool, MatchError> {
    match pattern_type {
        PatternType::Domain => match_domain(parts, pattern),
        PatternType::SubdomainWildcard => match_subdomain_wildcard(parts, pattern),
        PatternType::ExactUrl => Ok(parts.raw == pattern),
        PatternType::HostPathPrefix => match_host_path_prefix(parts, pattern),
        PatternType::Regex => match_regex(parts, pattern),
    }
}

/// Parse a candidate URL, mapping failures to [`MatchError::InvalidUrl`].
pub fn parse_url(url: &str) -> Result<UrlParts<'_>, MatchError> {
    UrlParts::parse(url).map_err(|source| MatchError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

fn log_failure(pattern_type: PatternType, result: Result<bool, MatchError>) -> bool {
    match result {
        Ok(matched) => matched,
        Err(e) => {
            log::debug!("no match for {} pattern: {}", pattern_type, e);
            false
        }
    }
}

// =============================================================================
// Strategies
// =============================================================================

fn require_host<'p>(parts: &'p UrlParts<'_>) -> Result<&'p str, MatchError> {
    parts
        .host
        .as_deref()
        .ok_or_else(|| MatchError::MissingHost(parts.raw.to_string()))
}

fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> MatchError {
    MatchError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.into(),
    }
}

/// Same registrable domain; exact host equality when either side has none.
fn match_domain(parts: &UrlParts<'_>, pattern: &str) -> Result<bool, MatchError> {
    let host = require_host(parts)?;
    let pattern_host = normalize_host(pattern.trim());
    if pattern_host.is_empty() {
        return Err(invalid_pattern(pattern, "empty domain"));
    }

    match (registrable_domain(host), registrable_domain(&pattern_host)) {
        (Some(a), Some(b)) => Ok(a == b),
        _ => Ok(host == pattern_host),
    }
}

/// `*.base` matches `base` itself and anything ending in `.base`.
fn match_subdomain_wildcard(parts: &UrlParts<'_>, pattern: &str) -> Result<bool, MatchError> {
    let host = require_host(parts)?;
    let base = pattern.strip_prefix("*.").unwrap_or(pattern);
    let base = normalize_host(base);
    if base.is_empty() || base.contains('*') {
        return Err(invalid_pattern(pattern, "expected *.base"));
    }

    if host == base {
        return Ok(true);
    }
    Ok(host.len() > base.len()
        && host.ends_with(base.as_str())
        && host.as_bytes()[host.len() - base.len() - 1] == b'.')
}

/// Host (ignoring `www.`), then port when the pattern names one, then path.
fn match_host_path_prefix(parts: &UrlParts<'_>, pattern: &str) -> Result<bool, MatchError> {
    let host = require_host(parts)?;

    let with_scheme;
    let target_url = if has_scheme(pattern) {
        pattern
    } else {
        let (pattern_host, _) = split_host_path(pattern)
            .ok_or_else(|| invalid_pattern(pattern, "host_path_prefix requires a path"))?;
        if pattern_host.is_empty() {
            return Err(invalid_pattern(pattern, "missing host"));
        }
        with_scheme = format!("http://{}", pattern);
        with_scheme.as_str()
    };

    let target = UrlParts::parse(target_url).map_err(|e| invalid_pattern(pattern, e.to_string()))?;
    let target_host = target
        .host
        .as_deref()
        .ok_or_else(|| invalid_pattern(pattern, "pattern URL has no host"))?;

    if strip_www(host) != strip_www(target_host) {
        return Ok(false);
    }
    if target.port.is_some() && target.port != parts.effective_port {
        return Ok(false);
    }
    Ok(path_has_prefix(&parts.path, &target.path))
}

fn match_regex(parts: &UrlParts<'_>, pattern: &str) -> Result<bool, MatchError> {
    Ok(compiled_regex(pattern)?.is_match(parts.raw))
}

/// Compile `pattern`, reusing an earlier compilation when there is one.
///
/// Invalid patterns are not cached. A poisoned cache is bypassed.
fn compiled_regex(pattern: &str) -> Result<Regex, MatchError> {
    let cache = REGEX_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    if let Ok(cache) = cache.lock() {
        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }
    }

    let re = Regex::new(pattern).map_err(|source| MatchError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })?;

    if let Ok(mut cache) = cache.lock() {
        if cache.len() >= REGEX_CACHE_CAPACITY {
            cache.clear();
        }
        cache.insert(pattern.to_string(), re.clone());
    }
    Ok(re)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_matches_registrable_domain() {
        assert!(matches("https://mail.example.co.uk/x", "example.co.uk", PatternType::Domain));
        assert!(matches("https://example.co.uk", "shop.example.co.uk", PatternType::Domain));
        assert!(!matches("https://other.org", "example.co.uk", PatternType::Domain));
    }

    #[test]
    fn test_domain_falls_back_to_host_equality() {
        assert!(matches("http://localhost:8080/", "localhost", PatternType::Domain));
        assert!(!matches("http://localhost/", "otherhost", PatternType::Domain));
        assert!(matches("http://10.0.0.1/admin", "10.0.0.1", PatternType::Domain));
    }

    #[test]
    fn test_subdomain_wildcard() {
        let wildcard = |url: &str, pattern: &str| {
            matches(url, pattern, PatternType::SubdomainWildcard)
        };
        assert!(wildcard("https://drive.google.com", "*.google.com"));
        assert!(wildcard("https://google.com/", "*.google.com"));
        assert!(wildcard("https://a.b.google.com/", "*.GOOGLE.com"));
        assert!(!wildcard("https://notgoogle.com", "*.google.com"));
        assert!(!wildcard("https://google.com.evil.net", "*.google.com"));
    }

    #[test]
    fn test_exact_url_is_byte_equal() {
        let url = "https://example.com/a?b=c";
        assert!(matches(url, url, PatternType::ExactUrl));
        assert!(!matches(url, "https://example.com/a?b=C", PatternType::ExactUrl));
        assert!(!matches(
            "https://Example.com/",
            "https://example.com/",
            PatternType::ExactUrl
        ));
    }

    #[test]
    fn test_host_path_prefix() {
        let prefix = |url: &str, pattern: &str| matches(url, pattern, PatternType::HostPathPrefix);
        assert!(prefix("https://www.google.com/maps/dir", "google.com/maps"));
        assert!(!prefix("https://google.com/other", "google.com/maps"));
        assert!(prefix("https://google.com/maps", "google.com/maps/"));
        assert!(prefix("https://google.com/maps/x", "WWW.Google.com/maps"));
        assert!(!prefix("https://maps.google.com/maps", "google.com/maps"));
    }

    #[test]
    fn test_host_path_prefix_with_port() {
        let prefix = |url: &str, pattern: &str| matches(url, pattern, PatternType::HostPathPrefix);
        assert!(prefix("http://localhost:8080/admin/users", "localhost:8080/admin"));
        assert!(prefix("http://localhost:8080/admin", "localhost:8080/admin"));
        assert!(!prefix("http://localhost:9090/admin", "localhost:8080/admin"));
        assert!(!prefix("http://localhost/admin", "localhost:8080/admin"));
        assert!(prefix("https://example.com/app", "example.com:443/app"));
        assert!(prefix("http://localhost:8080/admin", "http://localhost:8080/admin"));
        assert!(!prefix("http://localhost:3000/admin", "http://localhost:8080/admin"));
        // No port in the pattern covers every port.
        assert!(prefix("http://localhost:8080/admin", "localhost/admin"));
    }

    #[test]
    fn test_host_path_prefix_rejects_missing_host() {
        assert!(matches!(
            evaluate("https://google.com/maps", "/maps", PatternType::HostPathPrefix),
            Err(MatchError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_host_path_prefix_accepts_full_url_pattern() {
        assert!(matches(
            "https://www.google.com/maps/place",
            "https://google.com/maps",
            PatternType::HostPathPrefix
        ));
        assert!(matches(
            "https://google.com/anything",
            "https://google.com",
            PatternType::HostPathPrefix
        ));
    }

    #[test]
    fn test_host_path_prefix_requires_path() {
        assert!(!matches("https://google.com/maps", "google.com", PatternType::HostPathPrefix));
        assert!(matches!(
            evaluate("https://google.com/maps", "google.com", PatternType::HostPathPrefix),
            Err(MatchError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_regex() {
        let regex = |url: &str, pattern: &str| matches(url, pattern, PatternType::Regex);
        assert!(regex("https://ads.example.com/track?id=1", r"/track\?id=\d+"));
        assert!(regex("https://example.com/", r"^https://example\.com/$"));
        assert!(!regex("https://example.com/", r"^http://"));
    }

    #[test]
    fn test_regex_compilations_are_reused() {
        let pattern = r"^https://cached\.example/\d+$";
        assert!(matches("https://cached.example/1", pattern, PatternType::Regex));
        assert!(REGEX_CACHE
            .get()
            .and_then(|cache| cache.lock().ok())
            .is_some_and(|cache| cache.contains_key(pattern)));
        assert!(matches("https://cached.example/22", pattern, PatternType::Regex));
        assert!(!matches("https://cached.example/x", pattern, PatternType::Regex));

        assert!(!matches("https://example.com/", "(never cached", PatternType::Regex));
        assert!(REGEX_CACHE
            .get()
            .and_then(|cache| cache.lock().ok())
            .is_some_and(|cache| !cache.contains_key("(never cached")));
    }

    #[test]
    fn test_matches_parts_agrees_with_matches() {
        let url = "https://www.google.com/maps/dir";
        let parts = parse_url(url).unwrap();
        for (pattern, t) in [
            ("google.com", PatternType::Domain),
            ("*.google.com", PatternType::SubdomainWildcard),
            ("google.com/maps", PatternType::HostPathPrefix),
            ("/maps/", PatternType::Regex),
            ("google.com/other", PatternType::HostPathPrefix),
        ] {
            assert_eq!(matches_parts(&parts, pattern, t), matches(url, pattern, t), "{pattern}");
        }
    }

    #[test]
    fn test_invalid_regex_is_no_match() {
        assert!(!matches("https://example.com/", "(unclosed", PatternType::Regex));
        assert!(matches!(
            evaluate("https://example.com/", "(unclosed", PatternType::Regex),
            Err(MatchError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_unparseable_url_is_no_match() {
        for t in PatternType::ALL {
            assert!(!matches("not a url", "example.com", t), "type {t}");
        }
        assert!(matches!(
            evaluate("::", "example.com", PatternType::Domain),
            Err(MatchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_host_strategies_need_a_host() {
        assert!(matches!(
            evaluate("mailto:a@example.com", "example.com", PatternType::Domain),
            Err(MatchError::MissingHost(_))
        ));
        assert!(matches("mailto:a@example.com", "^mailto:", PatternType::Regex));
    }

    #[test]
    fn test_matches_raw_unknown_type() {
        assert!(!matches_raw("https://example.com/", "example.com", "glob"));
        assert!(matches_raw("https://example.com/", "example.com", "domain"));
    }
}
