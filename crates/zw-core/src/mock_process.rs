//! In-memory collaborators for testing the engine without touching the host.
//!
//! - [`FakeSnapshotProvider`]: scripted port/process snapshots and live lookups
//! - [`RecordingKiller`]: records kill attempts, optionally failing chosen pids
//! - [`ProcessEntryBuilder`]: ergonomic [`ProcessEntry`] construction
//!
//! # Example
//!
//! ```ignore
//! use zw_core::mock_process::{FakeSnapshotProvider, ProcessEntryBuilder};
//!
//! let provider = FakeSnapshotProvider::new();
//! provider.set_processes(vec![
//!     ProcessEntryBuilder::new(100, "vite dev").parent(10).created("20260314100000").build(),
//! ]);
//! ```
//!
//! State sits behind mutexes so a test can change snapshots between ticks
//! while a reconciler holds a shared reference.

use std::collections::BTreeMap;
use std::sync::Mutex;

use zw_common::ProcessFilter;

use crate::action::{KillError, ProcessKiller};
use crate::collect::{CollectError, PortSnapshot, ProcessEntry, ProcessInfo, SnapshotProvider};

#[derive(Debug, Default)]
struct FakeState {
    ports: PortSnapshot,
    processes: Vec<ProcessEntry>,
    live: BTreeMap<u32, String>,
    fail_ports: bool,
    fail_processes: bool,
    port_calls: usize,
    process_calls: usize,
}

/// Scripted snapshot provider.
#[derive(Debug, Default)]
pub struct FakeSnapshotProvider {
    state: Mutex<FakeState>,
}

impl FakeSnapshotProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Replace the port snapshot.
    pub fn set_ports<I>(&self, ports: I)
    where
        I: IntoIterator<Item = (u16, u32)>,
    {
        self.with_state(|s| s.ports = ports.into_iter().collect());
    }

    /// Replace the process snapshot. Each entry also becomes live.
    pub fn set_processes(&self, processes: Vec<ProcessEntry>) {
        self.with_state(|s| {
            for entry in &processes {
                s.live.insert(entry.pid, entry.command.clone());
            }
            s.processes = processes;
        });
    }

    /// Make `pid` visible to point lookups with `command`.
    pub fn set_live(&self, pid: u32, command: &str) {
        self.with_state(|s| {
            s.live.insert(pid, command.to_string());
        });
    }

    /// Make `pid` invisible to point lookups.
    pub fn remove_live(&self, pid: u32) {
        self.with_state(|s| {
            s.live.remove(&pid);
        });
    }

    /// Make the next port snapshots fail.
    pub fn fail_ports(&self, fail: bool) {
        self.with_state(|s| s.fail_ports = fail);
    }

    /// Make the next process snapshots fail.
    pub fn fail_processes(&self, fail: bool) {
        self.with_state(|s| s.fail_processes = fail);
    }

    /// Number of snapshot calls served, ports plus processes.
    pub fn snapshot_calls(&self) -> usize {
        self.with_state(|s| s.port_calls + s.process_calls)
    }
}

impl SnapshotProvider for FakeSnapshotProvider {
    fn snapshot_ports(&self) -> Result<PortSnapshot, CollectError> {
        self.with_state(|s| {
            s.port_calls += 1;
            if s.fail_ports {
                return Err(CollectError::Unsupported("scripted port failure"));
            }
            Ok(s.ports.clone())
        })
    }

    fn snapshot_processes(
        &self,
        filter: &ProcessFilter,
    ) -> Result<Vec<ProcessEntry>, CollectError> {
        self.with_state(|s| {
            s.process_calls += 1;
            if s.fail_processes {
                return Err(CollectError::Unsupported("scripted process failure"));
            }
            Ok(s.processes
                .iter()
                .filter(|e| filter.matches(&e.command))
                .cloned()
                .collect())
        })
    }

    fn get_process_info(&self, pid: u32) -> Option<ProcessInfo> {
        self.with_state(|s| {
            s.live.get(&pid).map(|command| ProcessInfo {
                pid,
                command: command.clone(),
            })
        })
    }
}

/// Kill primitive that records attempts instead of signalling.
#[derive(Debug, Default)]
pub struct RecordingKiller {
    attempts: Mutex<Vec<(u32, bool)>>,
    killed: Mutex<Vec<u32>>,
    failures: Mutex<BTreeMap<u32, KillError>>,
}

impl RecordingKiller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every kill of `pid` fail with `error`.
    pub fn fail_pid(&self, pid: u32, error: KillError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(pid, error);
        }
    }

    /// Stop failing kills of `pid`.
    pub fn clear_failure(&self, pid: u32) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(&pid);
        }
    }

    /// Every `(pid, force)` attempt, in call order.
    pub fn attempts(&self) -> Vec<(u32, bool)> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Pids whose kill succeeded, in call order.
    pub fn killed(&self) -> Vec<u32> {
        self.killed.lock().map(|k| k.clone()).unwrap_or_default()
    }
}

impl ProcessKiller for RecordingKiller {
    fn kill(&self, pid: u32, force: bool) -> Result<(), KillError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push((pid, force));
        }
        let failure = self
            .failures
            .lock()
            .ok()
            .and_then(|f| f.get(&pid).cloned());
        if let Some(err) = failure {
            return Err(err);
        }
        if let Ok(mut killed) = self.killed.lock() {
            killed.push(pid);
        }
        Ok(())
    }
}

/// Builder for [`ProcessEntry`].
#[derive(Debug, Clone)]
pub struct ProcessEntryBuilder {
    entry: ProcessEntry,
}

impl ProcessEntryBuilder {
    pub fn new(pid: u32, command: &str) -> Self {
        Self {
            entry: ProcessEntry {
                pid,
                command: command.to_string(),
                parent_pid: None,
                creation_timestamp: None,
            },
        }
    }

    pub fn parent(mut self, ppid: u32) -> Self {
        self.entry.parent_pid = Some(ppid);
        self
    }

    /// Structured creation timestamp, e.g. `"20260314100000.000000+000"`.
    pub fn created(mut self, timestamp: &str) -> Self {
        self.entry.creation_timestamp = Some(timestamp.to_string());
        self
    }

    /// Creation timestamp rendered from a local datetime.
    pub fn created_at(self, at: chrono::DateTime<chrono::Local>) -> Self {
        let ts = at.format(crate::collect::process_scan::CREATION_TIMESTAMP_FORMAT).to_string();
        self.created(&ts)
    }

    pub fn build(self) -> ProcessEntry {
        self.entry
    }
}
