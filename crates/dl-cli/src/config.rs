//! CLI configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.cache/domain-lists/lists.redb";
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub config_url: Option<String>,
    pub fetch_timeout: Duration,
    /// Public Suffix List data file, if any
    pub psl_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let home = lookup("HOME");
        let expand = |raw: String| expand_tilde(&raw, home.as_deref());

        Self {
            db_path: expand(
                lookup("DOMAIN_LISTS_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            ),
            config_url: lookup("DOMAIN_LISTS_CONFIG_URL").filter(|s| !s.is_empty()),
            fetch_timeout: Duration::from_millis(
                lookup("DOMAIN_LISTS_FETCH_TIMEOUT_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_FETCH_TIMEOUT_MS),
            ),
            psl_path: lookup("DOMAIN_LISTS_PSL").filter(|s| !s.is_empty()).map(expand),
        }
    }
}

/// Expand a leading `~/` against `home`. Other paths are returned unchanged.
fn expand_tilde(raw: &str, home: Option<&str>) -> PathBuf {
    match (raw.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(raw),
    }
}
