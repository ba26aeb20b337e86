//! Log level and format selection.
//!
//! Precedence, highest first: `-v`/`-q`, `ZW_LOG`, `RUST_LOG` directives,
//! then `info`. `ZW_LOG_FORMAT` is overridden by `--log-format`.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console format (default).
    #[default]
    Human,
    /// Machine-parseable JSON lines.
    Jsonl,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "human" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

/// Minimum level emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Level selected by `-v`/`-q` counts. Verbosity wins over quiet.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Option<Self> {
        match (verbose, quiet) {
            (0, false) => None,
            (0, true) => Some(LogLevel::Warn),
            (1, _) => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    }

    /// `EnvFilter` directive for this level.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("unknown log level: {}", s)),
        }
    }
}

/// Resolved logging setup for one run.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Raw `RUST_LOG` directives, kept only when no explicit level was chosen.
    pub directives: Option<String>,
}

impl LogConfig {
    /// Resolve from the process environment and CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    /// Same as `from_env` with an injectable variable lookup.
    pub fn from_lookup<F>(
        lookup: F,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_level = lookup("ZW_LOG").and_then(|v| v.parse::<LogLevel>().ok());
        let level = cli_level.or(env_level);
        let directives = match level {
            Some(_) => None,
            None => lookup("RUST_LOG").filter(|v| !v.trim().is_empty()),
        };

        let format = cli_format
            .or_else(|| lookup("ZW_LOG_FORMAT").and_then(|v| v.parse().ok()))
            .unwrap_or_default();

        LogConfig {
            format,
            level: level.unwrap_or_default(),
            directives,
        }
    }

    /// Filter string handed to `EnvFilter`.
    pub fn filter_directives(&self) -> &str {
        self.directives
            .as_deref()
            .unwrap_or_else(|| self.level.as_directive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn format_parse() {
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn verbosity_mapping() {
        assert_eq!(LogLevel::from_verbosity(0, false), None);
        assert_eq!(LogLevel::from_verbosity(0, true), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_verbosity(1, false), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_verbosity(3, true), Some(LogLevel::Trace));
    }

    #[test]
    fn defaults_to_info_human() {
        let config = LogConfig::from_lookup(lookup(&[]), None, None);
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Human);
        assert_eq!(config.filter_directives(), "info");
    }

    #[test]
    fn zw_log_beats_rust_log() {
        let config = LogConfig::from_lookup(
            lookup(&[("ZW_LOG", "error"), ("RUST_LOG", "debug")]),
            None,
            None,
        );
        assert_eq!(config.level, LogLevel::Error);
        assert_eq!(config.filter_directives(), "error");
    }

    #[test]
    fn rust_log_directives_pass_through() {
        let config = LogConfig::from_lookup(lookup(&[("RUST_LOG", "apply=debug")]), None, None);
        assert_eq!(config.filter_directives(), "apply=debug");
    }

    #[test]
    fn unparseable_zw_log_falls_back_to_rust_log() {
        let config = LogConfig::from_lookup(
            lookup(&[("ZW_LOG", "loud"), ("RUST_LOG", "reconcile=trace")]),
            None,
            None,
        );
        assert_eq!(config.filter_directives(), "reconcile=trace");
    }

    #[test]
    fn cli_overrides_env() {
        let config = LogConfig::from_lookup(
            lookup(&[("RUST_LOG", "warn"), ("ZW_LOG_FORMAT", "jsonl")]),
            Some(LogLevel::Trace),
            Some(LogFormat::Human),
        );
        assert_eq!(config.filter_directives(), "trace");
        assert_eq!(config.format, LogFormat::Human);
    }
}
