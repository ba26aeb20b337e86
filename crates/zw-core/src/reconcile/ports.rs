//! Port-mode reconciliation.
//!
//! The known-set maps every listening port inside a configured window to its
//! owning pid. A port absent from the previous tick is "new"; depending on
//! the strategy it may supersede an older port in the same window:
//!
//! - `chain`: new port `p` targets `p - 1`
//! - `kill-base`: new port `p > base` targets `base`
//!
//! A target is only acted on when it sits inside the window, was already
//! known last tick, and belongs to a different pid than the new port.

use std::collections::BTreeSet;

use chrono::{DateTime, Local};
use tracing::{debug, info};
use zw_common::{KillStrategy, PortWindow, WatcherConfig};

use super::{fail_open, Reconciler, TickReport};
use crate::action::{TerminationReason, Terminator};
use crate::collect::{PortSnapshot, SnapshotProvider};
use crate::logging::event_names;

/// Port a new listener on `new_port` would supersede, before actionability
/// checks.
pub fn resolve_target(strategy: KillStrategy, new_port: u16, base: u16) -> Option<u16> {
    match strategy {
        KillStrategy::Chain => new_port.checked_sub(1),
        KillStrategy::KillBase => (new_port > base).then_some(base),
    }
}

fn reason_for(strategy: KillStrategy, port: u16, trigger_port: u16) -> TerminationReason {
    match strategy {
        KillStrategy::Chain => TerminationReason::ChainPredecessor { port, trigger_port },
        KillStrategy::KillBase => TerminationReason::BasePort { port, trigger_port },
    }
}

/// Diff engine over listening ports.
pub struct PortReconciler<'a> {
    provider: &'a dyn SnapshotProvider,
    terminator: Terminator<'a>,
    windows: Vec<PortWindow>,
    strategy: KillStrategy,
    known: PortSnapshot,
    tick: u64,
}

impl<'a> PortReconciler<'a> {
    pub fn new(
        provider: &'a dyn SnapshotProvider,
        terminator: Terminator<'a>,
        config: &WatcherConfig,
    ) -> Self {
        Self {
            provider,
            terminator,
            windows: config.windows(),
            strategy: config.strategy,
            known: PortSnapshot::new(),
            tick: 0,
        }
    }

    /// Ports known after the last tick.
    pub fn known(&self) -> &PortSnapshot {
        &self.known
    }

    fn window_for(&self, port: u16) -> Option<PortWindow> {
        self.windows.iter().copied().find(|w| w.contains(port))
    }

    fn in_any_window(&self, port: u16) -> bool {
        self.window_for(port).is_some()
    }
}

impl Reconciler for PortReconciler<'_> {
    fn name(&self) -> &'static str {
        "ports"
    }

    fn tick_at(&mut self, _now: DateTime<Local>) -> TickReport {
        self.tick += 1;
        let (mut current, snapshot_error) = fail_open(self.provider.snapshot_ports(), "ports");
        current.retain(|&port, pid| {
            self.in_any_window(port) && !self.terminator.is_protected(*pid)
        });

        debug!(target: event_names::SCAN_PORTS, tick = self.tick, observed = current.len(),
            "port snapshot");

        let previous = std::mem::take(&mut self.known);
        let mut report = TickReport {
            tick: self.tick,
            observed: current.len(),
            snapshot_error,
            ..TickReport::default()
        };
        let mut handled: BTreeSet<u32> = BTreeSet::new();

        for (&port, &pid) in &current {
            match previous.get(&port) {
                Some(&old_pid) if old_pid != pid => {
                    info!(target: event_names::RECONCILE_PORT_OWNER_CHANGED, port,
                        old_pid, pid, "port changed owner");
                    continue;
                }
                Some(_) => continue,
                None => {}
            }

            report.new_entries += 1;
            info!(target: event_names::RECONCILE_PORT_NEW, port, pid, "new port detected");

            let Some(window) = self.window_for(port) else {
                continue;
            };
            let Some(target) = resolve_target(self.strategy, port, window.base) else {
                continue;
            };
            if target < window.base {
                continue;
            }
            let Some(&target_pid) = previous.get(&target) else {
                continue;
            };
            // Same process listening on both ports: nothing superseded.
            if target_pid == pid || !handled.insert(target_pid) {
                continue;
            }

            let reason = reason_for(self.strategy, target, port);
            let record = self.terminator.terminate(self.provider, target_pid, reason);
            report.terminations.push(record);
        }

        report.gone_entries = previous.keys().filter(|p| !current.contains_key(p)).count();

        let killed: BTreeSet<u32> = report
            .terminations
            .iter()
            .filter(|r| r.outcome.is_killed())
            .map(|r| r.pid)
            .collect();
        current.retain(|_, pid| !killed.contains(pid));
        self.known = current;

        report
    }
}
