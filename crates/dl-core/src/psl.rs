//! Public Suffix List (PSL) utilities for registrable-domain extraction
//!
//! A parsed list can be installed once per process with [`init_psl`]. Until
//! then (or if it never is) a small built-in heuristic is used.
//!
//! # Examples
//!
//! ```
//! use dl_core::psl::registrable_domain;
//!
//! assert_eq!(registrable_domain("sub.example.com").as_deref(), Some("example.com"));
//! assert_eq!(registrable_domain("mail.example.co.uk").as_deref(), Some("example.co.uk"));
//! assert_eq!(registrable_domain("localhost"), None);
//! ```

use std::net::IpAddr;
use std::sync::OnceLock;

use publicsuffix::{List, Psl};

// =============================================================================
// Global PSL State
// =============================================================================

static PSL_LIST: OnceLock<List> = OnceLock::new();

/// Parse PSL data (the `public_suffix_list.dat` format).
pub fn load_psl(text: &str) -> Result<List, publicsuffix::Error> {
    text.parse()
}

/// Install a parsed list for the rest of the process.
///
/// Returns `false` if a list was already installed; the first list wins.
pub fn init_psl(list: List) -> bool {
    PSL_LIST.set(list).is_ok()
}

// =============================================================================
// Registrable Domain Extraction
// =============================================================================

/// Common two-part public suffixes for fallback.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr",
    "com.au", "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "net.au", "net.nz",
    "org.uk", "org.au",
    "gov.uk", "gov.au",
    "ac.uk", "ac.jp",
    "ne.jp", "or.jp",
];

/// Lowercase a host and strip a single trailing dot.
pub fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Get the registrable domain (eTLD+1) for a hostname.
///
/// Returns `None` when the host has no registrable domain: empty hosts,
/// IP literals, single labels, and hosts that are themselves a public suffix.
pub fn registrable_domain(host: &str) -> Option<String> {
    let host = normalize_host(host);
    if host.is_empty() || is_ip_literal(&host) {
        return None;
    }

    if let Some(list) = PSL_LIST.get() {
        let domain = list.domain(host.as_bytes())?;
        return std::str::from_utf8(domain.as_bytes())
            .ok()
            .map(str::to_string);
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.iter().any(|label| label.is_empty()) {
        return None;
    }
    fallback_registrable(&labels)
}

/// Fallback registrable-domain heuristic.
fn fallback_registrable(labels: &[&str]) -> Option<String> {
    let n = labels.len();
    if n < 2 {
        return None;
    }

    let last_two = labels[n - 2..].join(".");
    if COMMON_TWO_PART_TLDS.contains(&last_two.as_str()) {
        if n < 3 {
            return None;
        }
        return Some(labels[n - 3..].join("."));
    }

    Some(last_two)
}

fn is_ip_literal(host: &str) -> bool {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    bare.parse::<IpAddr>().is_ok()
}
