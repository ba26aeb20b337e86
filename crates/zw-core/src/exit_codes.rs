//! Exit codes for the `zw` binary.
//!
//! Exit code ranges:
//! - 0: clean stop (including interrupt)
//! - 10-19: user/environment errors (recoverable by user action)
//! - 20-29: internal errors

/// Exit codes for `zw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Clean run or interrupt-driven stop
    Clean = 0,

    /// Invalid arguments or configuration
    ArgsError = 10,

    /// Platform cannot provide snapshots
    CapabilityError = 11,

    /// Lock port already held by another watcher
    LockError = 14,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates any error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Stable name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::CapabilityError => "ERR_CAPABILITY",
            ExitCode::LockError => "ERR_LOCK",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Map a library error to the exit code reported for it at startup.
    pub fn for_error(err: &zw_common::Error) -> Self {
        use zw_common::ErrorCategory;
        match err.category() {
            ErrorCategory::Config => ExitCode::ArgsError,
            ErrorCategory::Lock => ExitCode::LockError,
            ErrorCategory::Platform => ExitCode::CapabilityError,
            ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::Collection | ErrorCategory::Action => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::CapabilityError.as_i32(), 11);
        assert_eq!(ExitCode::LockError.as_i32(), 14);
        assert_eq!(ExitCode::InternalError.as_i32(), 20);
        assert_eq!(ExitCode::IoError.as_i32(), 21);
    }

    #[test]
    fn error_classification() {
        assert!(!ExitCode::Clean.is_error());
        assert!(ExitCode::ArgsError.is_error());
        assert!(ExitCode::IoError.is_error());
    }

    #[test]
    fn display_includes_name_and_code() {
        assert_eq!(ExitCode::LockError.to_string(), "ERR_LOCK (14)");
    }

    #[test]
    fn errors_map_to_codes() {
        assert_eq!(
            ExitCode::for_error(&zw_common::Error::EmptyFilter),
            ExitCode::ArgsError
        );
        assert_eq!(
            ExitCode::for_error(&zw_common::Error::LockHeld { port: 9 }),
            ExitCode::LockError
        );
        assert_eq!(
            ExitCode::for_error(&zw_common::Error::UnsupportedPlatform("x".into())),
            ExitCode::CapabilityError
        );
    }
}
