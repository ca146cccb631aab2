//! Store configuration.
//!
//! # Responsibility
//! - Define the storage root and connection-cache windows with sensible
//!   defaults and environment overrides.

use crate::db::pool::{FRESH_WINDOW, STALE_WINDOW};
use log::warn;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_STORAGE_ROOT: &str = "shared_knowledge";

const ENV_STORAGE_ROOT: &str = "MEMBANK_STORAGE_DIR";
const ENV_FRESH_WINDOW: &str = "MEMBANK_FRESH_WINDOW_SECS";
const ENV_STALE_WINDOW: &str = "MEMBANK_STALE_WINDOW_SECS";

/// Configuration for one [`crate::GraphService`] instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory holding the registry document and per-project
    /// stores.
    pub storage_root: PathBuf,
    /// Age under which a cached connection is reused.
    pub fresh_window: Duration,
    /// Age beyond which a cached connection is swept.
    pub stale_window: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            fresh_window: FRESH_WINDOW,
            stale_window: STALE_WINDOW,
        }
    }
}

impl StoreConfig {
    /// Builds a config from defaults plus environment overrides.
    ///
    /// Invalid window values are ignored with a warning; they never fail
    /// startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(root) = std::env::var(ENV_STORAGE_ROOT) {
            if !root.trim().is_empty() {
                config.storage_root = PathBuf::from(root);
            }
        }
        if let Some(window) = window_from_env(ENV_FRESH_WINDOW) {
            config.fresh_window = window;
        }
        if let Some(window) = window_from_env(ENV_STALE_WINDOW) {
            config.stale_window = window;
        }
        config
    }

    /// Uses a different storage root.
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }
}

fn window_from_env(name: &str) -> Option<Duration> {
    let raw = std::env::var(name).ok()?;
    match parse_window_secs(&raw) {
        Some(window) => Some(window),
        None => {
            warn!("event=config_parse module=core status=error var={name} value={raw}");
            None
        }
    }
}

/// Parses a positive whole-second window value.
fn parse_window_secs(raw: &str) -> Option<Duration> {
    let secs: u64 = raw.trim().parse().ok()?;
    if secs == 0 {
        return None;
    }
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::{parse_window_secs, StoreConfig};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn default_config_matches_pool_windows() {
        let config = StoreConfig::default();
        assert_eq!(config.storage_root, PathBuf::from("shared_knowledge"));
        assert_eq!(config.fresh_window, Duration::from_secs(300));
        assert_eq!(config.stale_window, Duration::from_secs(600));
    }

    #[test]
    fn parse_window_secs_accepts_positive_integers() {
        assert_eq!(parse_window_secs(" 30 "), Some(Duration::from_secs(30)));
    }

    #[test]
    fn parse_window_secs_rejects_zero_and_garbage() {
        assert_eq!(parse_window_secs("0"), None);
        assert_eq!(parse_window_secs("five"), None);
        assert_eq!(parse_window_secs("-3"), None);
    }
}
