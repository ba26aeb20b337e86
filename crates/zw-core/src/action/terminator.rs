//! Safety-gated termination.
//!
//! Every kill request passes the same gate, in order:
//! 1. never the watcher itself or its parent
//! 2. re-fetch the live process; a vanished target is skipped
//! 3. the live command line must match the process filter
//! 4. dry-run stops here and only logs
//! 5. forced kill through the [`ProcessKiller`]

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use zw_common::ProcessFilter;

use super::signal::{KillError, ProcessKiller};
use crate::collect::SnapshotProvider;
use crate::logging::event_names;

/// Why a pid was sent to the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    /// Chain strategy: `port` was superseded by `trigger_port = port + 1`.
    ChainPredecessor { port: u16, trigger_port: u16 },
    /// Kill-base strategy: a higher port in the window appeared.
    BasePort { port: u16, trigger_port: u16 },
    /// An older cluster of the same command exists alongside a newer one.
    Superseded { command: String },
    /// The process outlived the configured age limit.
    MaxAge { max_age_minutes: u64 },
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::ChainPredecessor { port, trigger_port } => {
                write!(f, "port {} superseded by new port {}", port, trigger_port)
            }
            TerminationReason::BasePort { port, trigger_port } => {
                write!(f, "base port {} superseded by new port {}", port, trigger_port)
            }
            TerminationReason::Superseded { .. } => write!(f, "superseded by newer instance"),
            TerminationReason::MaxAge { max_age_minutes } => {
                write!(f, "max age exceeded ({} min)", max_age_minutes)
            }
        }
    }
}

/// Result of one pass through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationOutcome {
    Killed,
    SkippedDryRun,
    Failed,
    TargetGone,
    RefusedFilter,
    RefusedSelf,
}

impl TerminationOutcome {
    /// True when the pid is no longer alive and may be purged.
    pub fn is_killed(self) -> bool {
        self == TerminationOutcome::Killed
    }
}

impl std::fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TerminationOutcome::Killed => "killed",
            TerminationOutcome::SkippedDryRun => "skipped_dry_run",
            TerminationOutcome::Failed => "failed",
            TerminationOutcome::TargetGone => "target_gone",
            TerminationOutcome::RefusedFilter => "refused_filter",
            TerminationOutcome::RefusedSelf => "refused_self",
        };
        write!(f, "{}", s)
    }
}

/// One gate decision, as reported in the tick report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationRecord {
    pub pid: u32,
    pub reason: TerminationReason,
    pub outcome: TerminationOutcome,
    /// Live command line at decision time, when it was fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The termination gate.
pub struct Terminator<'a> {
    filter: ProcessFilter,
    dry_run: bool,
    killer: &'a dyn ProcessKiller,
    protected: BTreeSet<u32>,
}

impl<'a> Terminator<'a> {
    /// Gate protecting the current process and its parent.
    pub fn new(filter: ProcessFilter, dry_run: bool, killer: &'a dyn ProcessKiller) -> Self {
        Self::with_protected(filter, dry_run, killer, own_lineage())
    }

    /// Gate protecting an explicit pid set.
    pub fn with_protected<I>(
        filter: ProcessFilter,
        dry_run: bool,
        killer: &'a dyn ProcessKiller,
        protected: I,
    ) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        Self {
            filter,
            dry_run,
            killer,
            protected: protected.into_iter().collect(),
        }
    }

    /// True for pids the gate always refuses.
    pub fn is_protected(&self, pid: u32) -> bool {
        self.protected.contains(&pid)
    }

    /// Run `pid` through the gate.
    pub fn terminate(
        &self,
        provider: &dyn SnapshotProvider,
        pid: u32,
        reason: TerminationReason,
    ) -> TerminationRecord {
        let mut record = TerminationRecord {
            pid,
            reason,
            outcome: TerminationOutcome::TargetGone,
            command: None,
            error: None,
        };

        if self.is_protected(pid) {
            warn!(target: event_names::APPLY_REFUSED_SELF, pid, reason = %record.reason,
                "refusing to terminate the watcher's own process tree");
            record.outcome = TerminationOutcome::RefusedSelf;
            return record;
        }

        let Some(live) = provider.get_process_info(pid) else {
            info!(target: event_names::APPLY_TARGET_GONE, pid, "target already gone");
            return record;
        };

        if !self.filter.matches(&live.command) {
            warn!(target: event_names::APPLY_REFUSED_FILTER, pid, command = live.command.as_str(),
                reason = %record.reason, "target does not match process filter; refusing");
            record.command = Some(live.command);
            record.outcome = TerminationOutcome::RefusedFilter;
            return record;
        }
        record.command = Some(live.command);

        if self.dry_run {
            info!(target: event_names::APPLY_DRY_RUN, pid, command = record.command.as_deref(),
                reason = %record.reason, "dry run: would terminate");
            record.outcome = TerminationOutcome::SkippedDryRun;
            return record;
        }

        match self.killer.kill(pid, true) {
            Ok(()) => {
                info!(target: event_names::APPLY_KILLED, pid, command = record.command.as_deref(),
                    reason = %record.reason, "terminated");
                record.outcome = TerminationOutcome::Killed;
            }
            Err(KillError::NotFound(_)) => {
                info!(target: event_names::APPLY_TARGET_GONE, pid, "target exited before signal");
                record.outcome = TerminationOutcome::TargetGone;
            }
            Err(e) => {
                warn!(target: event_names::APPLY_FAILED, pid, error = %e,
                    reason = %record.reason, "termination failed; will re-evaluate next tick");
                record.error = Some(e.to_string());
                record.outcome = TerminationOutcome::Failed;
            }
        }

        record
    }
}

/// The watcher's own pid and, on Unix, its parent.
fn own_lineage() -> Vec<u32> {
    let mut pids = vec![std::process::id()];
    #[cfg(unix)]
    pids.push(std::os::unix::process::parent_id());
    pids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_process::{FakeSnapshotProvider, RecordingKiller};

    fn reason() -> TerminationReason {
        TerminationReason::ChainPredecessor {
            port: 3000,
            trigger_port: 3001,
        }
    }

    #[test]
    fn kills_matching_target() {
        let provider = FakeSnapshotProvider::new();
        provider.set_live(111, "node server.js");
        let killer = RecordingKiller::new();
        let gate = Terminator::with_protected(ProcessFilter::parse("node"), false, &killer, []);

        let record = gate.terminate(&provider, 111, reason());
        assert_eq!(record.outcome, TerminationOutcome::Killed);
        assert_eq!(record.command.as_deref(), Some("node server.js"));
        assert_eq!(killer.killed(), vec![111]);
    }

    #[test]
    fn refuses_unmatched_command() {
        let provider = FakeSnapshotProvider::new();
        provider.set_live(111, "/usr/sbin/sshd -D");
        let killer = RecordingKiller::new();
        let gate = Terminator::with_protected(ProcessFilter::parse("node"), false, &killer, []);

        let record = gate.terminate(&provider, 111, reason());
        assert_eq!(record.outcome, TerminationOutcome::RefusedFilter);
        assert!(killer.killed().is_empty());
    }

    #[test]
    fn vanished_target_is_gone() {
        let provider = FakeSnapshotProvider::new();
        let killer = RecordingKiller::new();
        let gate = Terminator::with_protected(ProcessFilter::parse("node"), false, &killer, []);

        let record = gate.terminate(&provider, 404, reason());
        assert_eq!(record.outcome, TerminationOutcome::TargetGone);
        assert!(record.command.is_none());
        assert!(killer.attempts().is_empty());
    }

    #[test]
    fn dry_run_never_signals() {
        let provider = FakeSnapshotProvider::new();
        provider.set_live(111, "node server.js");
        let killer = RecordingKiller::new();
        let gate = Terminator::with_protected(ProcessFilter::parse("node"), true, &killer, []);

        let record = gate.terminate(&provider, 111, reason());
        assert_eq!(record.outcome, TerminationOutcome::SkippedDryRun);
        assert!(killer.attempts().is_empty());
    }

    #[test]
    fn protected_pid_refused_before_lookup() {
        let provider = FakeSnapshotProvider::new();
        provider.set_live(7, "node watcher");
        let killer = RecordingKiller::new();
        let gate = Terminator::with_protected(ProcessFilter::parse("node"), false, &killer, [7]);

        let record = gate.terminate(&provider, 7, reason());
        assert_eq!(record.outcome, TerminationOutcome::RefusedSelf);
        assert!(killer.attempts().is_empty());
    }

    #[test]
    fn default_gate_protects_own_pid() {
        let provider = FakeSnapshotProvider::new();
        provider.set_live(std::process::id(), "node test-harness");
        let killer = RecordingKiller::new();
        let gate = Terminator::new(ProcessFilter::parse("node"), false, &killer);

        let record = gate.terminate(&provider, std::process::id(), reason());
        assert_eq!(record.outcome, TerminationOutcome::RefusedSelf);
    }

    #[test]
    fn kill_failure_reported() {
        let provider = FakeSnapshotProvider::new();
        provider.set_live(111, "node server.js");
        let killer = RecordingKiller::new();
        killer.fail_pid(111, KillError::PermissionDenied(111));
        let gate = Terminator::with_protected(ProcessFilter::parse("node"), false, &killer, []);

        let record = gate.terminate(&provider, 111, reason());
        assert_eq!(record.outcome, TerminationOutcome::Failed);
        assert_eq!(
            record.error.as_deref(),
            Some("permission denied signalling pid 111")
        );
    }

    #[test]
    fn reason_and_outcome_display() {
        assert_eq!(reason().to_string(), "port 3000 superseded by new port 3001");
        assert_eq!(
            TerminationReason::Superseded {
                command: "vite".into()
            }
            .to_string(),
            "superseded by newer instance"
        );
        assert_eq!(TerminationOutcome::SkippedDryRun.to_string(), "skipped_dry_run");
    }

    #[test]
    fn record_serializes_reason_tag() {
        let record = TerminationRecord {
            pid: 1,
            reason: reason(),
            outcome: TerminationOutcome::Killed,
            command: None,
            error: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["reason"]["kind"], "chain_predecessor");
        assert_eq!(json["outcome"], "killed");
    }
}
