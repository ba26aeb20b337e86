//! Reconciliation engines.
//!
//! A reconciler owns a known-set, takes one fresh snapshot per tick, diffs
//! it against the known-set and sends every actionable target through the
//! [`Terminator`](crate::action::Terminator). The two engines share nothing
//! but this trait and the gate.

pub mod cluster;
mod ports;
mod processes;
pub mod start_time;

pub use ports::{resolve_target, PortReconciler};
pub use processes::{ProcessReconciler, ProcessRecord};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::action::{TerminationOutcome, TerminationRecord};
use crate::collect::CollectError;
use crate::logging::event_names;

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// 1-based pass counter.
    pub tick: u64,
    /// Entries in this tick's (window-restricted) snapshot.
    pub observed: usize,
    pub new_entries: usize,
    pub gone_entries: usize,
    /// Every gate decision made this tick, in order.
    pub terminations: Vec<TerminationRecord>,
    /// Set when the snapshot failed and the tick ran on an empty one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_error: Option<String>,
}

impl TickReport {
    pub fn count(&self, outcome: TerminationOutcome) -> usize {
        self.terminations
            .iter()
            .filter(|r| r.outcome == outcome)
            .count()
    }

    pub fn killed(&self) -> usize {
        self.count(TerminationOutcome::Killed)
    }

    pub fn failed(&self) -> usize {
        self.count(TerminationOutcome::Failed)
    }
}

/// One tick-driven reconciliation engine.
pub trait Reconciler {
    /// Short engine name for logs ("ports", "processes").
    fn name(&self) -> &'static str;

    /// Run one pass with an explicit clock reading.
    fn tick_at(&mut self, now: DateTime<Local>) -> TickReport;

    /// Run one pass now.
    fn tick(&mut self) -> TickReport {
        self.tick_at(Local::now())
    }
}

/// Degrade a failed snapshot to "nothing observed", logging why.
pub(crate) fn fail_open<T: Default>(
    result: Result<T, CollectError>,
    what: &'static str,
) -> (T, Option<String>) {
    match result {
        Ok(snapshot) => (snapshot, None),
        Err(CollectError::Timeout(limit)) => {
            warn!(target: event_names::SCAN_TIMEOUT, snapshot = what,
                timeout_ms = limit.as_millis() as u64, "snapshot timed out; treating as empty");
            (T::default(), Some(format!("{} snapshot timed out", what)))
        }
        Err(e) => {
            warn!(target: event_names::SCAN_FAILED, snapshot = what, error = %e,
                "snapshot failed; treating as empty");
            (T::default(), Some(e.to_string()))
        }
    }
}
