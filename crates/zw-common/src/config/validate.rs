//! Configuration errors and semantic validation.

use super::{WatchMode, WatcherConfig, MAX_INTERVAL_MS, MAX_SNAPSHOT_TIMEOUT_MS};
use thiserror::Error;

/// Configuration load and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("I/O error reading {path}: {message}")]
    IoError { path: String, message: String },

    #[error("parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("process filter is empty")]
    EmptyFilter,

    #[error("port mode requires at least one base port")]
    NoBasePort,

    #[error("window {base}+{range} exceeds port 65535")]
    WindowOverflow { base: u16, range: u16 },

    #[error("port windows {first} and {second} overlap")]
    OverlappingWindows { first: String, second: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::NotFound(_) => 60,
            ConfigError::IoError { .. } => 60,
            ConfigError::ParseError { .. } => 61,
            ConfigError::EmptyFilter => 12,
            ConfigError::NoBasePort => 13,
            ConfigError::WindowOverflow { .. } => 14,
            ConfigError::OverlappingWindows { .. } => 15,
            ConfigError::InvalidValue { .. } => 10,
        }
    }
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::EmptyFilter => crate::Error::EmptyFilter,
            other => crate::Error::Config(other.to_string()),
        }
    }
}

/// Validate a fully merged config.
pub(super) fn validate_config(config: &WatcherConfig) -> Result<(), ConfigError> {
    if config.filter.is_empty() {
        return Err(ConfigError::EmptyFilter);
    }

    check_millis("interval_ms", config.interval_ms, MAX_INTERVAL_MS)?;
    check_millis(
        "snapshot_timeout_ms",
        config.snapshot_timeout_ms,
        MAX_SNAPSHOT_TIMEOUT_MS,
    )?;

    if config.max_age_minutes > 0 && config.max_age().is_none() {
        return Err(ConfigError::InvalidValue {
            field: "max_age_minutes".to_string(),
            message: format!("{} minutes is out of range", config.max_age_minutes),
        });
    }

    if config.mode == WatchMode::Ports {
        validate_windows(config)?;
    }

    Ok(())
}

fn check_millis(field: &str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    if value > max {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("{value} exceeds the maximum of {max}"),
        });
    }
    Ok(())
}

fn validate_windows(config: &WatcherConfig) -> Result<(), ConfigError> {
    if config.base_ports.is_empty() {
        return Err(ConfigError::NoBasePort);
    }

    for &base in &config.base_ports {
        if base == 0 {
            return Err(ConfigError::InvalidValue {
                field: "base_ports".to_string(),
                message: "port 0 is not a valid base".to_string(),
            });
        }
        if base.checked_add(config.range).is_none() {
            return Err(ConfigError::WindowOverflow {
                base,
                range: config.range,
            });
        }
    }

    let windows = config.windows();
    for (i, first) in windows.iter().enumerate() {
        for second in &windows[i + 1..] {
            if first.overlaps(second) {
                return Err(ConfigError::OverlappingWindows {
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
        }
    }

    Ok(())
}
