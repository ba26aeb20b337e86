//! Signal delivery.
//!
//! [`ProcessKiller`] is the only path by which the watcher affects other
//! processes. [`SignalKiller`] sends the signal and then polls briefly so a
//! process that survives is reported as a failure rather than a kill.

#[cfg(unix)]
use std::thread;
#[cfg(unix)]
use std::time::Instant;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KillError {
    #[error("process {0} not found")]
    NotFound(u32),

    #[error("permission denied signalling pid {0}")]
    PermissionDenied(u32),

    #[error("process {0} survived the signal")]
    Survived(u32),

    #[error("signal failed: {0}")]
    Failed(String),

    #[error("signals unsupported on this platform")]
    Unsupported,
}

impl From<KillError> for zw_common::Error {
    fn from(err: KillError) -> Self {
        match err {
            KillError::PermissionDenied(pid) => zw_common::Error::PermissionDenied { pid },
            KillError::Unsupported => {
                zw_common::Error::UnsupportedPlatform("process signals".to_string())
            }
            KillError::NotFound(pid) => zw_common::Error::KillFailed {
                pid,
                reason: "process not found".to_string(),
            },
            KillError::Survived(pid) => zw_common::Error::KillFailed {
                pid,
                reason: "process survived the signal".to_string(),
            },
            KillError::Failed(reason) => zw_common::Error::KillFailed { pid: 0, reason },
        }
    }
}

/// Termination primitive.
pub trait ProcessKiller: Send + Sync {
    /// Send SIGKILL (`force`) or SIGTERM to `pid`.
    fn kill(&self, pid: u32, force: bool) -> Result<(), KillError>;
}

/// Signal-based killer.
#[derive(Debug, Clone)]
pub struct SignalKiller {
    /// How long to wait for the target to disappear after signalling.
    pub verify_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SignalKiller {
    fn default() -> Self {
        Self {
            verify_timeout: Duration::from_millis(1_000),
            poll_interval: Duration::from_millis(25),
        }
    }
}

impl SignalKiller {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(unix)]
    fn send_signal(&self, pid: u32, signal: i32) -> Result<(), KillError> {
        let target = libc::pid_t::try_from(pid)
            .map_err(|_| KillError::Failed(format!("pid {} out of range", pid)))?;
        if target <= 0 {
            return Err(KillError::Failed(format!("refusing to signal pid {}", pid)));
        }

        // SAFETY: kill(2) with a positive pid and a valid signal number.
        let result = unsafe { libc::kill(target, signal) };
        if result == 0 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => Err(KillError::NotFound(pid)),
            Some(libc::EPERM) => Err(KillError::PermissionDenied(pid)),
            _ => Err(KillError::Failed(err.to_string())),
        }
    }

    /// True while the pid exists and is not a zombie.
    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> bool {
        let Ok(target) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // SAFETY: signal 0 performs the existence check only.
        let result = unsafe { libc::kill(target, 0) };
        let exists = result == 0
            || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
        exists && process_state(pid) != Some('Z')
    }

    #[cfg(unix)]
    fn wait_for_exit(&self, pid: u32) -> bool {
        let start = Instant::now();
        while start.elapsed() < self.verify_timeout {
            if !self.is_alive(pid) {
                return true;
            }
            thread::sleep(self.poll_interval);
        }
        !self.is_alive(pid)
    }
}

impl ProcessKiller for SignalKiller {
    #[cfg(unix)]
    fn kill(&self, pid: u32, force: bool) -> Result<(), KillError> {
        let signal = if force { libc::SIGKILL } else { libc::SIGTERM };
        self.send_signal(pid, signal)?;
        if self.wait_for_exit(pid) {
            Ok(())
        } else {
            Err(KillError::Survived(pid))
        }
    }

    #[cfg(not(unix))]
    fn kill(&self, _pid: u32, _force: bool) -> Result<(), KillError> {
        Err(KillError::Unsupported)
    }
}

/// Process state letter from /proc/[pid]/stat.
#[cfg(target_os = "linux")]
fn process_state(pid: u32) -> Option<char> {
    let content = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // Format: pid (comm) state ...
    let comm_end = content.rfind(')')?;
    content.get(comm_end + 2..)?.chars().next()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn process_state(_pid: u32) -> Option<char> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    #[test]
    fn kills_child_process() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .expect("spawn sleep");
        let pid = child.id();

        // Reap in the background so the zombie disappears.
        let reaper = thread::spawn(move || child.wait());

        SignalKiller::new().kill(pid, true).unwrap();
        let status = reaper.join().unwrap().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn missing_pid_is_not_found() {
        let result = SignalKiller::new().kill(u32::MAX / 2, true);
        assert!(matches!(
            result,
            Err(KillError::NotFound(_)) | Err(KillError::Failed(_))
        ));
    }

    #[test]
    fn zero_pid_refused() {
        assert!(matches!(
            SignalKiller::new().kill(0, true),
            Err(KillError::Failed(_))
        ));
    }

    #[test]
    fn errors_map_to_common_codes() {
        let err: zw_common::Error = KillError::PermissionDenied(9).into();
        assert_eq!(err.code(), 41);
        let err: zw_common::Error = KillError::Survived(9).into();
        assert_eq!(err.code(), 40);
    }
}
