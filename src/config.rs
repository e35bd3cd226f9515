//! Runtime configuration (spec §6 ambient stack): loaded from `config.json`
//! when present, falling back to defaults — a missing file is not an error,
//! matching the "missing servers.json is an empty list" policy applied
//! uniformly across the on-disk layout.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub probe_timeout_secs: u64,
    pub srv_cache_ttl_secs: u64,
    pub status_cache_ttl_secs: u64,
    pub sampler_interval_secs: u64,
    pub sampler_interval_min_secs: u64,
    pub sampler_interval_max_secs: u64,
    pub full_sweep_workers: usize,
    pub log_retention_count: usize,
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 5,
            srv_cache_ttl_secs: 300,
            status_cache_ttl_secs: 60,
            sampler_interval_secs: 30,
            sampler_interval_min_secs: 5,
            sampler_interval_max_secs: 300,
            full_sweep_workers: crate::orchestrator::DEFAULT_SWEEP_WORKERS,
            log_retention_count: 50,
            page_size: 25,
        }
    }
}

impl Config {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn srv_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.srv_cache_ttl_secs)
    }

    pub fn status_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.status_cache_ttl_secs)
    }

    /// Clamps a requested sampler interval into the configured bounds.
    pub fn clamp_sampler_interval(&self, requested_secs: u64) -> Duration {
        Duration::from_secs(requested_secs.clamp(self.sampler_interval_min_secs, self.sampler_interval_max_secs))
    }

    /// Loads `config.json` from `path`, falling back to `Config::default()`
    /// when the file is absent or fails to parse.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => {
                debug!("no config.json at {path:?}, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("failed to parse {path:?}: {e}, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load("/nonexistent/config.json");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "{not valid json").unwrap();
        let config = Config::load(tmp.path());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_fills_missing_fields_from_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), r#"{"probe_timeout_secs": 10}"#).unwrap();
        let config = Config::load(tmp.path());
        assert_eq!(config.probe_timeout_secs, 10);
        assert_eq!(config.log_retention_count, Config::default().log_retention_count);
    }

    #[test]
    fn sampler_interval_clamps_to_bounds() {
        let config = Config::default();
        assert_eq!(config.clamp_sampler_interval(1).as_secs(), config.sampler_interval_min_secs);
        assert_eq!(config.clamp_sampler_interval(10_000).as_secs(), config.sampler_interval_max_secs);
    }
}
