//! Bounded execution of external enumeration tools (`ps`, `lsof`).
//!
//! - Per-command timeout with SIGTERM → SIGKILL escalation
//! - Output size cap
//! - Rejection of commands containing shell metacharacters
//! - Minimal, locale-stable environment (`LC_ALL=C`)

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Default timeout per command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum captured output per stream (4MB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// Grace period between SIGTERM and SIGKILL.
const SIGTERM_GRACE: Duration = Duration::from_millis(200);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command failed to spawn: {0}")]
    SpawnFailed(String),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("command exited with non-zero status: {code}")]
    NonZeroExit { code: i32 },

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Captured output of one tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub command: String,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    /// Output hit the byte cap.
    pub truncated: bool,
    pub duration: Duration,
}

impl ToolOutput {
    /// Stdout as string (lossy UTF-8 conversion).
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external tools under a deadline.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    timeout: Duration,
    max_output_bytes: usize,
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ToolRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_max_output(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `cmd args...` and return its captured output.
    ///
    /// A non-zero exit is returned as `Ok` with `exit_code` set; callers
    /// decide whether partial output is usable (`lsof` exits 1 when it
    /// finds nothing).
    pub fn run(&self, cmd: &str, args: &[&str]) -> Result<ToolOutput, ToolError> {
        validate_command(cmd)?;

        let timeout_ms = self.timeout.as_millis() as u64;
        debug!(command = cmd, args = ?args, timeout_ms, "running tool");
        let start = Instant::now();

        let mut command = Command::new(cmd);
        command
            .args(args)
            .env_clear()
            .env("LC_ALL", "C")
            .env("LANG", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Ok(path) = std::env::var("PATH") {
            command.env("PATH", path);
        }

        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::CommandNotFound(cmd.to_string()),
            _ => ToolError::SpawnFailed(e.to_string()),
        })?;

        let cap = self.max_output_bytes;
        let stdout_reader = child.stdout.take().map(|s| spawn_reader(s, cap));
        let stderr_reader = child.stderr.take().map(|s| spawn_reader(s, cap));

        let deadline = start.checked_add(self.timeout);
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if deadline.is_some_and(|d| Instant::now() >= d) => {
                    warn!(command = cmd, "tool timed out, terminating");
                    kill_with_grace(&mut child);
                    return Err(ToolError::Timeout(self.timeout));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let (stdout, out_truncated) = join_reader(stdout_reader);
        let (stderr, err_truncated) = join_reader(stderr_reader);
        let duration = start.elapsed();
        trace!(command = cmd, duration_ms = duration.as_millis() as u64, "tool finished");

        Ok(ToolOutput {
            command: cmd.to_string(),
            stdout,
            stderr,
            exit_code: status.code(),
            truncated: out_truncated || err_truncated,
            duration,
        })
    }

    /// Like `run`, but a non-zero exit is an error.
    pub fn run_checked(&self, cmd: &str, args: &[&str]) -> Result<ToolOutput, ToolError> {
        let output = self.run(cmd, args)?;
        match output.exit_code {
            Some(0) => Ok(output),
            Some(code) => Err(ToolError::NonZeroExit { code }),
            None => Err(ToolError::NonZeroExit { code: -1 }),
        }
    }
}

/// Reject commands that would only make sense to a shell.
fn validate_command(cmd: &str) -> Result<(), ToolError> {
    if cmd.is_empty() {
        return Err(ToolError::InvalidCommand("empty command".to_string()));
    }
    if cmd.contains(['|', '&', ';', '$', '`', '\n', '\r', '<', '>']) {
        return Err(ToolError::InvalidCommand(format!(
            "command contains shell metacharacters: {}",
            cmd
        )));
    }
    if cmd.starts_with('/') && !Path::new(cmd).exists() {
        return Err(ToolError::CommandNotFound(cmd.to_string()));
    }
    Ok(())
}

/// Read a pipe to EOF on a helper thread, keeping at most `cap` bytes.
fn spawn_reader<R>(mut stream: R, cap: usize) -> thread::JoinHandle<(Vec<u8>, bool)>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        let mut truncated = false;
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let space = cap.saturating_sub(buf.len());
                    if n > space {
                        truncated = true;
                    }
                    buf.extend_from_slice(&chunk[..n.min(space)]);
                }
            }
        }
        (buf, truncated)
    })
}

fn join_reader(handle: Option<thread::JoinHandle<(Vec<u8>, bool)>>) -> (Vec<u8>, bool) {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// SIGTERM, then SIGKILL after a short grace period.
#[cfg(unix)]
fn kill_with_grace(child: &mut Child) {
    let pid = child.id() as libc::pid_t;
    // SAFETY: signalling our own direct child.
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
    thread::sleep(SIGTERM_GRACE);
    if let Ok(None) = child.try_wait() {
        warn!(pid, "tool ignored SIGTERM, sending SIGKILL");
        let _ = child.kill();
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
fn kill_with_grace(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
