//! zombie-watch common types, IDs, and errors.
//!
//! This crate provides foundational types shared by the watcher engine:
//! - Run identity
//! - The unified error type with stable codes
//! - The immutable watcher configuration and its validation

pub mod config;
pub mod error;
pub mod id;

pub use config::{
    load_config, ConfigError, ConfigOptions, ConfigSource, KillStrategy, PortWindow,
    ProcessFilter, ResolvedConfig, WatchMode, WatcherConfig,
};
pub use error::{Error, ErrorCategory, Result};
pub use id::RunId;
