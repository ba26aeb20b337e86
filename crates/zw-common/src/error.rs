//! Error types for zombie-watch.
//!
//! Every error carries:
//! - A stable numeric code for machine parsing
//! - A category for grouping
//! - A recoverability hint (can the next tick succeed?)
//! - A remediation string for humans
//!
//! Per-tick failures are absorbed by the reconcilers; only configuration,
//! lock, and platform errors surface at startup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for zombie-watch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file or flag errors.
    Config,
    /// Port / process enumeration errors.
    Collection,
    /// Termination errors.
    Action,
    /// Singleton lock errors.
    Lock,
    /// File I/O and serialization errors.
    Io,
    /// Platform compatibility errors.
    Platform,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Collection => write!(f, "collection"),
            ErrorCategory::Action => write!(f, "action"),
            ErrorCategory::Lock => write!(f, "lock"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Platform => write!(f, "platform"),
        }
    }
}

/// Unified error type for zombie-watch.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid kill strategy: {0}")]
    InvalidStrategy(String),

    #[error("no process filter given")]
    EmptyFilter,

    // Collection errors (20-29)
    #[error("enumeration failed: {0}")]
    Collection(String),

    #[error("enumeration timed out after {millis}ms")]
    CollectionTimeout { millis: u64 },

    // Action errors (40-49)
    #[error("termination of pid {pid} failed: {reason}")]
    KillFailed { pid: u32, reason: String },

    #[error("permission denied signalling pid {pid}")]
    PermissionDenied { pid: u32 },

    // Lock errors (50-59)
    #[error("another watcher holds lock port {port}")]
    LockHeld { port: u16 },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Platform errors (70-79)
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Collection errors
    /// - 40-49: Action errors
    /// - 50-59: Lock errors
    /// - 60-69: I/O errors
    /// - 70-79: Platform errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidStrategy(_) => 11,
            Error::EmptyFilter => 12,
            Error::Collection(_) => 20,
            Error::CollectionTimeout { .. } => 21,
            Error::KillFailed { .. } => 40,
            Error::PermissionDenied { .. } => 41,
            Error::LockHeld { .. } => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::UnsupportedPlatform(_) => 70,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidStrategy(_) | Error::EmptyFilter => {
                ErrorCategory::Config
            }
            Error::Collection(_) | Error::CollectionTimeout { .. } => ErrorCategory::Collection,
            Error::KillFailed { .. } | Error::PermissionDenied { .. } => ErrorCategory::Action,
            Error::LockHeld { .. } => ErrorCategory::Lock,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
            Error::UnsupportedPlatform(_) => ErrorCategory::Platform,
        }
    }

    /// Returns whether a later tick may succeed where this one failed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Startup errors: the loop never starts
            Error::Config(_) | Error::InvalidStrategy(_) | Error::EmptyFilter => false,
            Error::LockHeld { .. } => false,
            Error::UnsupportedPlatform(_) => false,

            // Transient: next tick re-evaluates
            Error::Collection(_) | Error::CollectionTimeout { .. } => true,
            Error::KillFailed { .. } => true,
            Error::PermissionDenied { .. } => true,
            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Check the config file syntax and the values passed on the command line."
            }
            Error::InvalidStrategy(_) => "Use --strategy chain or --strategy kill-base.",
            Error::EmptyFilter => {
                "Pass at least one process name with --filter, e.g. --filter \"node;vite\"."
            }
            Error::Collection(_) => {
                "Check that ps/lsof are installed and /proc is readable. The watcher retries every tick."
            }
            Error::CollectionTimeout { .. } => {
                "The host is slow to enumerate. Raise --snapshot-timeout or the polling interval."
            }
            Error::KillFailed { .. } => {
                "The process survived the signal. It is re-evaluated on the next tick."
            }
            Error::PermissionDenied { .. } => {
                "The target belongs to another user. Run the watcher as that user or with CAP_KILL."
            }
            Error::LockHeld { .. } => {
                "Another watcher is already running. Stop it or pick a different --lock-port."
            }
            Error::Io(_) => "Check permissions and retry.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq . <file>'.",
            Error::UnsupportedPlatform(_) => {
                "This platform lacks the required process introspection."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_grouped_by_category() {
        assert_eq!(Error::Config("x".into()).code(), 10);
        assert_eq!(Error::EmptyFilter.code(), 12);
        assert_eq!(Error::CollectionTimeout { millis: 5 }.code(), 21);
        assert_eq!(Error::LockHeld { port: 1 }.code(), 50);
        assert_eq!(Error::UnsupportedPlatform("os".into()).code(), 70);
    }

    #[test]
    fn categories() {
        assert_eq!(Error::InvalidStrategy("x".into()).category(), ErrorCategory::Config);
        assert_eq!(Error::Collection("x".into()).category(), ErrorCategory::Collection);
        assert_eq!(
            Error::KillFailed {
                pid: 1,
                reason: "x".into()
            }
            .category(),
            ErrorCategory::Action
        );
        assert_eq!(Error::LockHeld { port: 9 }.category(), ErrorCategory::Lock);
    }

    #[test]
    fn tick_errors_are_recoverable_startup_errors_are_not() {
        assert!(Error::Collection("ps missing".into()).is_recoverable());
        assert!(Error::KillFailed {
            pid: 3,
            reason: "survived".into()
        }
        .is_recoverable());
        assert!(!Error::EmptyFilter.is_recoverable());
        assert!(!Error::LockHeld { port: 4000 }.is_recoverable());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            Error::LockHeld { port: 47000 }.to_string(),
            "another watcher holds lock port 47000"
        );
        assert_eq!(
            Error::CollectionTimeout { millis: 5000 }.to_string(),
            "enumeration timed out after 5000ms"
        );
    }

    #[test]
    fn category_display() {
        assert_eq!(ErrorCategory::Collection.to_string(), "collection");
        assert_eq!(ErrorCategory::Lock.to_string(), "lock");
    }

    #[test]
    fn remediation_is_never_empty() {
        let errors = [
            Error::Config("x".into()),
            Error::EmptyFilter,
            Error::Collection("x".into()),
            Error::PermissionDenied { pid: 1 },
            Error::UnsupportedPlatform("x".into()),
        ];
        for err in errors {
            assert!(!err.remediation().is_empty());
        }
    }
}
