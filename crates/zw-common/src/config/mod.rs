//! Watcher configuration model.
//!
//! A `WatcherConfig` is built once at startup (defaults, then config file,
//! then CLI flags), validated, and never mutated afterwards. Both
//! reconciliation engines read from it; neither owns it.

mod filter;
mod resolve;
mod validate;
mod window;

pub use filter::ProcessFilter;
pub use resolve::{
    load_config, ConfigOptions, ConfigSource, ResolvedConfig, CONFIG_DIR_NAME, CONFIG_ENV_VAR,
};
pub use validate::ConfigError;
pub use window::PortWindow;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default scan range above each base port.
pub const DEFAULT_RANGE: u16 = 10;

/// Default polling interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 2_000;

/// Default bound on a single snapshot enumeration.
pub const DEFAULT_SNAPSHOT_TIMEOUT_MS: u64 = 5_000;

/// Largest accepted polling interval (one day).
pub const MAX_INTERVAL_MS: u64 = 86_400_000;

/// Largest accepted snapshot bound (ten minutes).
pub const MAX_SNAPSHOT_TIMEOUT_MS: u64 = 600_000;

/// Which entity the watcher tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// Diff listening TCP ports inside the configured windows.
    #[default]
    Ports,
    /// Diff processes matching the name filter.
    Processes,
}

impl std::fmt::Display for WatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchMode::Ports => write!(f, "ports"),
            WatchMode::Processes => write!(f, "processes"),
        }
    }
}

/// Port-mode kill trigger strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KillStrategy {
    /// A new port kills the port immediately below it.
    #[default]
    Chain,
    /// Any new port above the base kills the base port.
    KillBase,
}

impl std::str::FromStr for KillStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chain" => Ok(KillStrategy::Chain),
            "kill-base" | "kill_base" | "killbase" => Ok(KillStrategy::KillBase),
            other => Err(crate::Error::InvalidStrategy(other.to_string())),
        }
    }
}

impl std::fmt::Display for KillStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KillStrategy::Chain => write!(f, "chain"),
            KillStrategy::KillBase => write!(f, "kill-base"),
        }
    }
}

/// Immutable configuration for one watcher run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Entity tracked by this run.
    pub mode: WatchMode,
    /// Base ports (port mode). More than one enables multi-base mode.
    pub base_ports: Vec<u16>,
    /// Width of the window above each base, inclusive.
    pub range: u16,
    /// Polling interval in milliseconds.
    pub interval_ms: u64,
    /// Port-mode trigger strategy.
    pub strategy: KillStrategy,
    /// Allowlist of process names; also the termination safety rail.
    pub filter: ProcessFilter,
    /// Log intended kills without sending signals.
    pub dry_run: bool,
    /// Process-mode age limit in minutes; 0 disables.
    pub max_age_minutes: u64,
    /// Auxiliary port bound to keep a single watcher instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_port: Option<u16>,
    /// Upper bound on one snapshot enumeration, in milliseconds.
    pub snapshot_timeout_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Ports,
            base_ports: Vec::new(),
            range: DEFAULT_RANGE,
            interval_ms: DEFAULT_INTERVAL_MS,
            strategy: KillStrategy::Chain,
            filter: ProcessFilter::default(),
            dry_run: false,
            max_age_minutes: 0,
            lock_port: None,
            snapshot_timeout_ms: DEFAULT_SNAPSHOT_TIMEOUT_MS,
        }
    }
}

impl WatcherConfig {
    /// Port windows `[base, base + range]`, one per base port.
    ///
    /// Bases whose window would overflow `u16` are clamped at `u16::MAX`;
    /// `validate` rejects such configs before the loop starts.
    pub fn windows(&self) -> Vec<PortWindow> {
        self.base_ports
            .iter()
            .map(|&base| PortWindow::new(base, self.range))
            .collect()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    /// Age limit for process mode, `None` when disabled.
    pub fn max_age(&self) -> Option<chrono::Duration> {
        if self.max_age_minutes == 0 {
            return None;
        }
        i64::try_from(self.max_age_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
    }

    /// Run semantic validation. Errors here are fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate::validate_config(self)
    }
}
