//! Runtime settings: request timeout, pair window, environment id.
//!
//! ```text
//!   CELLS_* variables              ← wins
//!   <root>/.cells/config.toml
//!   ~/.cells/config.toml
//!   CellsConfig::default()         ← fallback
//! ```
//!
//! | Variable | Field | Parsed as |
//! |----------|-------|-----------|
//! | `CELLS_DEBUG` | `debug` | bool (`true/1/yes/on`, `false/0/no/off`) |
//! | `CELLS_ENVIRONMENT_ID` | `environment.id` | string |
//! | `CELLS_REQUEST_TIMEOUT_MS` | `timeouts.request_ms` | u64 |
//! | `CELLS_PAIR_WINDOW_MS` | `pair.window_ms` | u64 |
//!
//! A file with every field:
//!
//! ```toml
//! debug = false
//!
//! [environment]
//! id = "cells"
//!
//! [timeouts]
//! request_ms = 1000
//!
//! [pair]
//! window_ms = 100
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{CellsConfig, EnvironmentConfig, PairConfig, TimeoutsConfig};

use std::path::PathBuf;

/// `~/.cells`, or `./.cells` when there is no home directory.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(PROJECT_CONFIG_DIR)
}

/// `~/.cells/config.toml`.
#[must_use]
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(PROJECT_CONFIG_FILE)
}

pub const PROJECT_CONFIG_DIR: &str = ".cells";

pub const PROJECT_CONFIG_FILE: &str = "config.toml";
