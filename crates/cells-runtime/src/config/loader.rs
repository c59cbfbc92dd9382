//! Layered configuration loading.
//!
//! | Order | Layer | Source |
//! |-------|-------|--------|
//! | 1 | defaults | [`CellsConfig::default`] |
//! | 2 | global | `~/.cells/config.toml` |
//! | 3 | project | `<root>/.cells/config.toml` |
//! | 4 | environment | `CELLS_*` variables |
//!
//! Later layers win, field by field.

use super::{default_config_path, CellsConfig, ConfigError, PROJECT_CONFIG_DIR, PROJECT_CONFIG_FILE};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

macro_rules! parse_env_bool {
    ($field:expr, $var:literal) => {
        if let Some(raw) = env_value($var) {
            $field = parse_bool(&raw).ok_or_else(|| {
                ConfigError::invalid_env_var($var, format!("{raw:?} is not a bool"))
            })?;
        }
    };
}

macro_rules! parse_env_u64 {
    ($field:expr, $var:literal) => {
        if let Some(raw) = env_value($var) {
            $field = raw.trim().parse::<u64>().map_err(|e| {
                ConfigError::invalid_env_var($var, format!("{raw:?}: {e}"))
            })?;
        }
    };
}

/// File layer a config was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileLayer {
    Global,
    Project,
}

impl fmt::Display for FileLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Project => f.write_str("project"),
        }
    }
}

/// Builds a [`CellsConfig`] from defaults, files and environment.
///
/// # Example
///
/// ```no_run
/// use cells_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_project_root(".")
///     .skip_env_vars()
///     .load()?;
/// println!("pair window: {:?}", config.pair.window());
/// # Ok::<(), cells_runtime::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    global_path: Option<PathBuf>,
    project_root: Option<PathBuf>,
    use_env: Toggle,
    use_global: Toggle,
    use_project: Toggle,
}

/// `true` unless switched off.
#[derive(Debug, Clone, Copy)]
struct Toggle(bool);

impl Default for Toggle {
    fn default() -> Self {
        Self(true)
    }
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the global layer from `path` instead of `~/.cells/config.toml`.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_path = Some(path.into());
        self
    }

    /// Enables the project layer, `<root>/.cells/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.use_env = Toggle(false);
        self
    }

    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.use_global = Toggle(false);
        self
    }

    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.use_project = Toggle(false);
        self
    }

    /// Config files to read, lowest priority first.
    fn file_layers(&self) -> Vec<(FileLayer, PathBuf)> {
        let mut layers = Vec::with_capacity(2);
        if self.use_global.0 {
            let path = self.global_path.clone().unwrap_or_else(default_config_path);
            layers.push((FileLayer::Global, path));
        }
        if self.use_project.0 {
            if let Some(root) = &self.project_root {
                let path = root.join(PROJECT_CONFIG_DIR).join(PROJECT_CONFIG_FILE);
                layers.push((FileLayer::Project, path));
            }
        }
        layers
    }

    /// Merges every enabled layer. Absent files are skipped.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when a present file cannot be read or parsed, or a
    /// `CELLS_*` variable does not parse.
    pub fn load(&self) -> Result<CellsConfig, ConfigError> {
        let mut config = CellsConfig::default();

        for (layer, path) in self.file_layers() {
            if let Some(found) = read_config_file(&path)? {
                debug!(%layer, path = %path.display(), "config layer applied");
                config.merge(&found);
            }
        }

        if self.use_env.0 {
            apply_env(&mut config)?;
        }
        Ok(config)
    }
}

fn read_config_file(path: &Path) -> Result<Option<CellsConfig>, ConfigError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    CellsConfig::from_toml(&text)
        .map(Some)
        .map_err(|e| ConfigError::parse_toml(path, e))
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

fn apply_env(config: &mut CellsConfig) -> Result<(), ConfigError> {
    parse_env_bool!(config.debug, "CELLS_DEBUG");
    parse_env_u64!(config.timeouts.request_ms, "CELLS_REQUEST_TIMEOUT_MS");
    parse_env_u64!(config.pair.window_ms, "CELLS_PAIR_WINDOW_MS");
    if let Some(id) = env_value("CELLS_ENVIRONMENT_ID") {
        config.environment.id = id;
    }
    Ok(())
}

/// Case-insensitive `true/1/yes/on` or `false/0/no/off`.
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
