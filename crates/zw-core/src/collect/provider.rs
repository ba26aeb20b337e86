//! Snapshot provider boundary.
//!
//! The reconcilers consume typed snapshots through [`SnapshotProvider`];
//! [`SystemProvider`] is the host-backed implementation. Every enumeration
//! runs on a worker thread and is abandoned when the snapshot deadline
//! passes, so a wedged `ps` or procfs read cannot stall the watch loop.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::debug;
use zw_common::ProcessFilter;

use super::process_scan;
use super::tool_runner::ToolRunner;
use super::types::{CollectError, PortSnapshot, ProcessEntry, ProcessInfo};

/// Source of port and process snapshots.
pub trait SnapshotProvider: Send + Sync {
    /// All TCP ports currently in LISTEN state with their owner pid.
    fn snapshot_ports(&self) -> Result<PortSnapshot, CollectError>;

    /// Processes whose command line matches `filter`.
    fn snapshot_processes(&self, filter: &ProcessFilter) -> Result<Vec<ProcessEntry>, CollectError>;

    /// Live lookup used to re-verify a kill target. `None` means gone.
    fn get_process_info(&self, pid: u32) -> Option<ProcessInfo>;
}

/// Host-backed provider.
#[derive(Debug, Clone)]
pub struct SystemProvider {
    runner: ToolRunner,
    deadline: Duration,
}

impl SystemProvider {
    /// Provider whose snapshots are abandoned after `deadline`.
    pub fn new(deadline: Duration) -> Self {
        Self {
            runner: ToolRunner::new(deadline),
            deadline,
        }
    }

    /// Run `work` on a worker thread, giving up after the deadline.
    fn bounded<T, F>(&self, name: &str, work: F) -> Result<T, CollectError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, CollectError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("zw-{}", name))
            .spawn(move || {
                let _ = tx.send(work());
            })?;

        match rx.recv_timeout(self.deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                debug!(worker = name, "abandoning enumeration worker");
                Err(CollectError::Timeout(self.deadline))
            }
            Err(RecvTimeoutError::Disconnected) => Err(CollectError::WorkerLost),
        }
    }
}

impl SnapshotProvider for SystemProvider {
    fn snapshot_ports(&self) -> Result<PortSnapshot, CollectError> {
        let runner = self.runner.clone();
        self.bounded("ports", move || listening_ports(&runner))
    }

    fn snapshot_processes(
        &self,
        filter: &ProcessFilter,
    ) -> Result<Vec<ProcessEntry>, CollectError> {
        let runner = self.runner.clone();
        let filter = filter.clone();
        self.bounded("processes", move || {
            process_scan::scan_processes(&runner, &filter)
        })
    }

    fn get_process_info(&self, pid: u32) -> Option<ProcessInfo> {
        let runner = self.runner.clone();
        self.bounded("lookup", move || Ok(process_scan::lookup_process(&runner, pid)))
            .ok()
            .flatten()
    }
}

#[cfg(target_os = "linux")]
fn listening_ports(_runner: &ToolRunner) -> Result<PortSnapshot, CollectError> {
    super::network::listening_ports_from_proc(std::path::Path::new("/proc"))
}

#[cfg(all(unix, not(target_os = "linux")))]
fn listening_ports(runner: &ToolRunner) -> Result<PortSnapshot, CollectError> {
    let output = runner.run("lsof", &["-nP", "-iTCP", "-sTCP:LISTEN", "-Fpn"])?;
    // lsof exits 1 when nothing matches
    Ok(super::network::fold_lowest_pid(
        super::network::parse_lsof_listen(&output.stdout_str()),
    ))
}

#[cfg(not(unix))]
fn listening_ports(_runner: &ToolRunner) -> Result<PortSnapshot, CollectError> {
    Err(CollectError::Unsupported("listening port enumeration"))
}
