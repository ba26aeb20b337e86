//! Process-mode reconciliation.
//!
//! Tracks every filter-matching process across ticks. Duplicate launches of
//! the same command are clustered by parent pid; all clusters except the
//! newest are terminated, which leaves sibling workers of the surviving
//! instance untouched. An optional age limit terminates long-lived instances,
//! counting no earlier than the watcher's own start.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zw_common::{ProcessFilter, WatcherConfig};

use super::cluster::{build_clusters, group_by_command, stale_clusters};
use super::start_time::resolve_start;
use super::{fail_open, Reconciler, TickReport};
use crate::action::{TerminationReason, TerminationRecord, Terminator};
use crate::collect::{ProcessEntry, SnapshotProvider};
use crate::logging::event_names;

/// A tracked process. Created on first sighting, never refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub command: String,
    pub first_seen_at: DateTime<Local>,
    pub creation_timestamp: Option<String>,
    pub parent_pid: Option<u32>,
}

impl ProcessRecord {
    fn from_entry(entry: ProcessEntry, now: DateTime<Local>) -> Self {
        Self {
            pid: entry.pid,
            command: entry.command,
            first_seen_at: now,
            creation_timestamp: entry.creation_timestamp,
            parent_pid: entry.parent_pid,
        }
    }

    /// Creation time when parseable, else first sighting.
    pub fn start(&self) -> DateTime<Local> {
        resolve_start(self.creation_timestamp.as_deref(), self.first_seen_at)
    }
}

/// Diff engine over filter-matching processes.
pub struct ProcessReconciler<'a> {
    provider: &'a dyn SnapshotProvider,
    terminator: Terminator<'a>,
    filter: ProcessFilter,
    max_age: Option<chrono::Duration>,
    max_age_minutes: u64,
    started_at: DateTime<Local>,
    known: BTreeMap<u32, ProcessRecord>,
    tick: u64,
}

impl<'a> ProcessReconciler<'a> {
    pub fn new(
        provider: &'a dyn SnapshotProvider,
        terminator: Terminator<'a>,
        config: &WatcherConfig,
    ) -> Self {
        Self {
            provider,
            terminator,
            filter: config.filter.clone(),
            max_age: config.max_age(),
            max_age_minutes: config.max_age_minutes,
            started_at: Local::now(),
            known: BTreeMap::new(),
            tick: 0,
        }
    }

    /// Override the watcher start used as the age-limit floor.
    pub fn with_started_at(mut self, started_at: DateTime<Local>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Records known after the last tick.
    pub fn known(&self) -> &BTreeMap<u32, ProcessRecord> {
        &self.known
    }

    /// Fold a snapshot into the known-set. Returns (new, gone) counts.
    fn merge(&mut self, snapshot: Vec<ProcessEntry>, now: DateTime<Local>) -> (usize, usize) {
        let present: BTreeSet<u32> = snapshot.iter().map(|e| e.pid).collect();
        let mut added = 0;
        for entry in snapshot {
            if self.known.contains_key(&entry.pid) {
                continue;
            }
            info!(target: event_names::RECONCILE_PROCESS_NEW, pid = entry.pid,
                command = entry.command.as_str(), parent_pid = entry.parent_pid,
                "new process detected");
            self.known.insert(entry.pid, ProcessRecord::from_entry(entry, now));
            added += 1;
        }

        let gone: Vec<u32> = self
            .known
            .keys()
            .filter(|pid| !present.contains(pid))
            .copied()
            .collect();
        for pid in &gone {
            if let Some(record) = self.known.remove(pid) {
                debug!(target: event_names::RECONCILE_PROCESS_GONE, pid = *pid,
                    command = record.command.as_str(), "process exited");
            }
        }
        (added, gone.len())
    }

    /// Pids in every cluster that a newer cluster of the same command supersedes.
    fn superseded_targets(&self) -> Vec<(u32, String)> {
        let mut targets = Vec::new();
        for (command, records) in group_by_command(self.known.values()) {
            if records.len() < 2 {
                continue;
            }
            let clusters = build_clusters(&records);
            let stale = stale_clusters(&clusters);
            if stale.is_empty() {
                continue;
            }
            info!(target: event_names::RECONCILE_CLUSTER_STALE, command = command.as_str(),
                clusters = clusters.len(), stale = stale.len(), "duplicate instances found");
            for cluster in stale {
                for &pid in &cluster.members {
                    targets.push((pid, command.clone()));
                }
            }
        }
        targets
    }

    /// Pids older than the age limit, measured from max(start, watcher start).
    fn expired_targets(&self, now: DateTime<Local>) -> Vec<u32> {
        let Some(limit) = self.max_age else {
            return Vec::new();
        };
        self.known
            .values()
            .filter(|record| {
                let effective = record.start().max(self.started_at);
                now.signed_duration_since(effective) > limit
            })
            .map(|record| record.pid)
            .collect()
    }

    fn apply(&mut self, pid: u32, reason: TerminationReason) -> TerminationRecord {
        let record = self.terminator.terminate(self.provider, pid, reason);
        if record.outcome.is_killed() {
            self.known.remove(&pid);
        }
        record
    }
}

impl Reconciler for ProcessReconciler<'_> {
    fn name(&self) -> &'static str {
        "processes"
    }

    fn tick_at(&mut self, now: DateTime<Local>) -> TickReport {
        self.tick += 1;
        let (mut snapshot, snapshot_error) =
            fail_open(self.provider.snapshot_processes(&self.filter), "processes");
        // The watcher's own command line usually contains a filter term.
        snapshot.retain(|entry| !self.terminator.is_protected(entry.pid));
        debug!(target: event_names::SCAN_PROCESSES, tick = self.tick, observed = snapshot.len(),
            "process snapshot");

        let observed = snapshot.len();
        let (new_entries, gone_entries) = self.merge(snapshot, now);
        let mut report = TickReport {
            tick: self.tick,
            observed,
            new_entries,
            gone_entries,
            snapshot_error,
            ..TickReport::default()
        };

        let mut handled: BTreeSet<u32> = BTreeSet::new();
        for (pid, command) in self.superseded_targets() {
            if !handled.insert(pid) {
                continue;
            }
            let record = self.apply(pid, TerminationReason::Superseded { command });
            report.terminations.push(record);
        }

        for pid in self.expired_targets(now) {
            if !handled.insert(pid) {
                continue;
            }
            info!(target: event_names::RECONCILE_MAX_AGE, pid,
                max_age_minutes = self.max_age_minutes, "process exceeded max age");
            let reason = TerminationReason::MaxAge {
                max_age_minutes: self.max_age_minutes,
            };
            let record = self.apply(pid, reason);
            report.terminations.push(record);
        }

        report
    }
}
