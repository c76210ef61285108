//! Engine configuration.
//!
//! Loaded from YAML. Every field is optional; an absent file means defaults.
//!
//! ```yaml
//! debounce_ms: 300
//! cancel_stale_runs: true
//! scratch_root: /tmp/eview
//! ```

use crate::error::{EviewError, EviewResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "EVIEW_CONFIG";

const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_KILL_GRACE_MS: u64 = 200;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Quiet period after the last edit before a run starts.
    pub debounce_ms: u64,
    /// Kill the in-flight process when an edit supersedes it.
    pub cancel_stale_runs: bool,
    /// Time between SIGTERM and SIGKILL when killing a run.
    pub kill_grace_ms: u64,
    /// Parent directory for session workspaces (system temp dir if unset).
    pub scratch_root: Option<PathBuf>,
    /// Where the CLI writes its log when `EVIEW_LOG` is set.
    pub log_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            cancel_stale_runs: false,
            kill_grace_ms: DEFAULT_KILL_GRACE_MS,
            scratch_root: None,
            log_file: None,
        }
    }
}

impl EngineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// Parse a YAML document.
    pub fn from_yaml(source: &str, origin: &Path) -> EviewResult<Self> {
        let config: Self = if source.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(source).map_err(|source| EviewError::ConfigParse {
                path: origin.to_path_buf(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> EviewResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| EviewError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&source, path)
    }

    /// Resolve the config the way the CLI does: `$EVIEW_CONFIG` if set
    /// (must exist), else the user config file if present, else defaults.
    pub fn discover() -> EviewResult<Self> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&explicit));
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> EviewResult<()> {
        if self.debounce_ms == 0 {
            return Err(EviewError::ConfigValue(
                "debounce_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(root) = &self.scratch_root {
            if !root.is_absolute() {
                return Err(EviewError::ConfigValue(format!(
                    "scratch_root must be an absolute path, got {}",
                    root.display()
                )));
            }
        }
        Ok(())
    }
}

/// `$XDG_CONFIG_HOME/eview/config.yml`, falling back to `~/.config`.
pub fn default_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|path| path.is_absolute())
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("eview").join("config.yml"))
}
