//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure, after all layers are merged.
///
/// Every field is optional in a config file.
///
/// # Example
///
/// ```
/// use cells_runtime::config::CellsConfig;
///
/// let config = CellsConfig::from_toml("[pair]\nwindow_ms = 250\n").unwrap();
/// assert_eq!(config.pair.window_ms, 250);
/// assert_eq!(config.environment.id, "cells");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CellsConfig {
    /// Verbose logging.
    pub debug: bool,

    pub environment: EnvironmentConfig,

    pub timeouts: TimeoutsConfig,

    pub pair: PairConfig,
}

impl CellsConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they differ
    /// from the default.
    pub fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.debug != default.debug {
            self.debug = other.debug;
        }

        self.environment.merge(&other.environment);
        self.timeouts.merge(&other.timeouts);
        self.pair.merge(&other.pair);
    }
}

/// Mesh host settings.
///
/// ```toml
/// [environment]
/// id = "cells"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Environment id, used in log lines.
    pub id: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self { id: "cells".into() }
    }
}

impl EnvironmentConfig {
    fn merge(&mut self, other: &Self) {
        if other.id != Self::default().id {
            self.id = other.id.clone();
        }
    }
}

/// Timeout settings.
///
/// ```toml
/// [timeouts]
/// request_ms = 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Default wait for request/response exchanges in milliseconds.
    pub request_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self { request_ms: 1_000 }
    }
}

impl TimeoutsConfig {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    fn merge(&mut self, other: &Self) {
        if other.request_ms != Self::default().request_ms {
            self.request_ms = other.request_ms;
        }
    }
}

/// Pair correlation settings.
///
/// ```toml
/// [pair]
/// window_ms = 100
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PairConfig {
    /// Maximum gap between two matching events, in milliseconds.
    pub window_ms: u64,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self { window_ms: 100 }
    }
}

impl PairConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn merge(&mut self, other: &Self) {
        if other.window_ms != Self::default().window_ms {
            self.window_ms = other.window_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CellsConfig::default();
        assert!(!config.debug);
        assert_eq!(config.environment.id, "cells");
        assert_eq!(config.timeouts.request(), Duration::from_secs(1));
        assert_eq!(config.pair.window(), Duration::from_millis(100));
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = CellsConfig::default();
        config.debug = true;
        config.pair.window_ms = 42;

        let text = config.to_toml().unwrap();
        assert!(text.contains("window_ms = 42"));
        assert_eq!(CellsConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = CellsConfig::from_toml("[timeouts]\nrequest_ms = 5\n").unwrap();
        assert_eq!(config.timeouts.request_ms, 5);
        assert_eq!(config.pair, PairConfig::default());
        assert!(!config.debug);
    }

    #[test]
    fn merge_only_overrides_non_defaults() {
        let mut base = CellsConfig::default();
        base.debug = true;
        base.environment.id = "base".into();

        let mut overlay = CellsConfig::default();
        overlay.pair.window_ms = 300;

        base.merge(&overlay);

        assert!(base.debug);
        assert_eq!(base.environment.id, "base");
        assert_eq!(base.pair.window_ms, 300);
        assert_eq!(base.timeouts.request_ms, 1_000);
    }

    #[test]
    fn unknown_field_type_is_an_error() {
        let toml = "[pair]\nwindow_ms = \"fast\"\n";
        assert!(CellsConfig::from_toml(toml).is_err());
    }
}
