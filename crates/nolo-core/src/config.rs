//! Flasher configuration.
//!
//! Optional TOML file loaded by the command-line front end. Missing keys
//! fall back to their defaults, so a partial file works.

use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::discovery::DEFAULT_POLL_INTERVAL;

/// Settings for a flashing session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlasherConfig {
    /// Log register writes instead of sending them.
    pub simulate: bool,
    /// Pause between device scans, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for FlasherConfig {
    fn default() -> Self {
        Self {
            simulate: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl FlasherConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FlasherConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_builtin_poll_interval() {
        let config = FlasherConfig::default();
        assert!(!config.simulate);
        assert_eq!(config.poll_interval(), DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn parses_a_full_file() {
        let config: FlasherConfig = toml::from_str(
            "simulate = true\npoll_interval_ms = 250\n",
        )
        .unwrap();
        assert!(config.simulate);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: FlasherConfig = toml::from_str("simulate = true\n").unwrap();
        assert!(config.simulate);
        assert_eq!(config.poll_interval_ms, 500);
    }
}
