//! Config file discovery and loading.
//!
//! Resolution order: `--config` → `$ZOMBIE_WATCH_CONFIG` → XDG config dir → defaults.
//! CLI flags are layered on top by the binary after loading.

use super::{ConfigError, WatcherConfig};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "ZOMBIE_WATCH_CONFIG";

/// Directory name under the XDG config root.
pub const CONFIG_DIR_NAME: &str = "zombie-watch";

const CONFIG_FILENAME: &str = "config.json";

/// Where the loaded config came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    CliArgument,
    Environment,
    XdgConfig,
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Options controlling config discovery.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Explicit `--config` path. Must exist when given.
    pub config_path: Option<PathBuf>,
    /// Override for the XDG config root (tests).
    pub config_dir: Option<PathBuf>,
    /// Skip the environment variable lookup (tests).
    pub ignore_env: bool,
}

/// A loaded config plus provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: WatcherConfig,
    pub source: ConfigSource,
    pub path: Option<PathBuf>,
}

/// Locate and parse the config file, falling back to defaults.
///
/// The result is not validated: CLI overrides are applied first.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    if let Some(path) = &options.config_path {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        return read_config(path, ConfigSource::CliArgument);
    }

    if !options.ignore_env {
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(env_path);
            if path.exists() {
                return read_config(&path, ConfigSource::Environment);
            }
        }
    }

    let xdg_root = options.config_dir.clone().or_else(dirs::config_dir);
    if let Some(root) = xdg_root {
        let path = root.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME);
        if path.exists() {
            return read_config(&path, ConfigSource::XdgConfig);
        }
    }

    Ok(ResolvedConfig {
        config: WatcherConfig::default(),
        source: ConfigSource::BuiltinDefault,
        path: None,
    })
}

fn read_config(path: &Path, source: ConfigSource) -> Result<ResolvedConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let config: WatcherConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    Ok(ResolvedConfig {
        config,
        source,
        path: Some(path.to_path_buf()),
    })
}
