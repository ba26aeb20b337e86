//! Tick scheduler.
//!
//! Runs one reconciler: an immediate first pass, then one pass per interval
//! until a stop is requested. Ticks never overlap. A stop request wakes the
//! pending interval wait at once; a tick already running completes first.

pub mod lock;

pub use lock::{InstanceLock, LockError};

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::TerminationOutcome;
use crate::log_event;
use crate::logging::{event_names, Level, LogContext, LogEvent, Stage};
use crate::reconcile::{Reconciler, TickReport};

/// Maximum events kept in [`SchedulerState::recent_events`].
pub const RECENT_EVENT_CAPACITY: usize = 100;

/// Cross-thread stop signal for the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the scheduler to stop after the current tick.
    pub fn request_stop(&self) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(|e| e.into_inner());
        *stopped = true;
        cvar.notify_all();
    }

    pub fn is_stop_requested(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep up to `timeout`, returning early on stop. True when stopped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        match cvar.wait_timeout_while(guard, timeout, |stopped| !*stopped) {
            Ok((guard, _)) => *guard,
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }
}

/// Running state of the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerState {
    pub started_at: DateTime<Utc>,
    pub tick_count: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub killed: u64,
    pub failed: u64,
    /// Recent events for the stop summary.
    pub recent_events: VecDeque<LogEvent>,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerState {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            tick_count: 0,
            last_tick_at: None,
            killed: 0,
            failed: 0,
            recent_events: VecDeque::with_capacity(RECENT_EVENT_CAPACITY),
        }
    }

    pub fn record_event(&mut self, event: LogEvent) {
        if self.recent_events.len() >= RECENT_EVENT_CAPACITY {
            self.recent_events.pop_front();
        }
        self.recent_events.push_back(event);
    }
}

fn outcome_event(outcome: TerminationOutcome) -> (&'static str, Level) {
    match outcome {
        TerminationOutcome::Killed => (event_names::APPLY_KILLED, Level::Info),
        TerminationOutcome::SkippedDryRun => (event_names::APPLY_DRY_RUN, Level::Info),
        TerminationOutcome::Failed => (event_names::APPLY_FAILED, Level::Warn),
        TerminationOutcome::TargetGone => (event_names::APPLY_TARGET_GONE, Level::Debug),
        TerminationOutcome::RefusedFilter => (event_names::APPLY_REFUSED_FILTER, Level::Warn),
        TerminationOutcome::RefusedSelf => (event_names::APPLY_REFUSED_SELF, Level::Warn),
    }
}

/// Drives one reconciler on a fixed interval.
pub struct Scheduler {
    interval: Duration,
    ctx: LogContext,
    shutdown: ShutdownHandle,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(interval: Duration, ctx: LogContext) -> Self {
        Self {
            interval,
            ctx,
            shutdown: ShutdownHandle::new(),
            state: SchedulerState::new(),
        }
    }

    /// Share an existing stop signal (e.g. one wired to Ctrl-C).
    pub fn with_shutdown(mut self, shutdown: ShutdownHandle) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Run a single pass inside a span carrying the run correlation ids.
    pub fn run_tick(&mut self, reconciler: &mut dyn Reconciler) -> TickReport {
        let tick = self.state.tick_count + 1;
        let span = tracing::info_span!(
            "tick",
            run_id = self.ctx.run_id.as_str(),
            host_id = self.ctx.host_id.as_str(),
            tick
        );
        let report = span.in_scope(|| reconciler.tick());
        self.absorb(&report);
        report
    }

    fn absorb(&mut self, report: &TickReport) {
        self.state.tick_count += 1;
        self.state.last_tick_at = Some(Utc::now());
        self.state.killed += report.killed() as u64;
        self.state.failed += report.failed() as u64;

        for record in &report.terminations {
            let (name, level) = outcome_event(record.outcome);
            let event = self
                .ctx
                .event(level, name, Stage::Apply, record.reason.to_string())
                .with_pid(record.pid)
                .with_field("outcome", record.outcome);
            self.state.record_event(event);
        }
        if let Some(err) = &report.snapshot_error {
            let event = self
                .ctx
                .warn(event_names::SCAN_FAILED, Stage::Scan, err.clone())
                .with_field("tick", report.tick);
            self.state.record_event(event);
        }

        log_event!(self.ctx, DEBUG, event_names::DAEMON_TICK, Stage::Daemon, "tick complete",
            tick = report.tick, observed = report.observed as u64,
            terminations = report.terminations.len() as u64);
    }

    /// Run until stopped. The first pass happens immediately.
    pub fn run(&mut self, reconciler: &mut dyn Reconciler) -> &SchedulerState {
        log_event!(self.ctx, INFO, event_names::DAEMON_STARTED, Stage::Daemon, "watcher started",
            engine = reconciler.name(), interval_ms = self.interval.as_millis() as u64);
        let started = self
            .ctx
            .info(event_names::DAEMON_STARTED, Stage::Daemon, "watcher started")
            .with_field("engine", reconciler.name());
        self.state.record_event(started);

        while !self.shutdown.is_stop_requested() {
            let tick_started = Instant::now();
            self.run_tick(reconciler);
            let wait = self.interval.saturating_sub(tick_started.elapsed());
            if self.shutdown.wait_timeout(wait) {
                break;
            }
        }

        log_event!(self.ctx, INFO, event_names::DAEMON_STOPPED, Stage::Daemon, "watcher stopped",
            ticks = self.state.tick_count, killed = self.state.killed,
            failed = self.state.failed);
        let stopped = self
            .ctx
            .info(event_names::DAEMON_STOPPED, Stage::Daemon, "watcher stopped")
            .with_field("ticks", self.state.tick_count);
        self.state.record_event(stopped);
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{TerminationReason, TerminationRecord};
    use chrono::Local;

    struct Counting {
        ticks: u64,
        stop_after: Option<(u64, ShutdownHandle)>,
    }

    impl Reconciler for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn tick_at(&mut self, _now: chrono::DateTime<Local>) -> TickReport {
            self.ticks += 1;
            if let Some((n, handle)) = &self.stop_after {
                if self.ticks >= *n {
                    handle.request_stop();
                }
            }
            TickReport {
                tick: self.ticks,
                terminations: vec![TerminationRecord {
                    pid: 7,
                    reason: TerminationReason::MaxAge { max_age_minutes: 1 },
                    outcome: TerminationOutcome::Killed,
                    command: None,
                    error: None,
                }],
                ..TickReport::default()
            }
        }
    }

    fn ctx() -> LogContext {
        LogContext::new("run-test", "host-test")
    }

    #[test]
    fn wait_returns_immediately_when_stopped() {
        let handle = ShutdownHandle::new();
        handle.request_stop();
        let started = Instant::now();
        assert!(handle.wait_timeout(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_times_out_without_stop() {
        let handle = ShutdownHandle::new();
        assert!(!handle.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn stop_from_another_thread_wakes_wait() {
        let handle = ShutdownHandle::new();
        let remote = handle.clone();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.request_stop();
        });
        assert!(handle.wait_timeout(Duration::from_secs(10)));
        t.join().unwrap();
    }

    #[test]
    fn runs_until_stopped_and_counts() {
        let mut scheduler = Scheduler::new(Duration::from_millis(1), ctx());
        let mut reconciler = Counting {
            ticks: 0,
            stop_after: Some((3, scheduler.shutdown_handle())),
        };
        let state = scheduler.run(&mut reconciler);
        assert_eq!(state.tick_count, 3);
        assert_eq!(state.killed, 3);
        assert!(state.last_tick_at.is_some());
    }

    #[test]
    fn recent_events_are_bounded() {
        let mut state = SchedulerState::new();
        for i in 0..(RECENT_EVENT_CAPACITY + 5) {
            state.record_event(ctx().info("daemon.tick", Stage::Daemon, format!("{}", i)));
        }
        assert_eq!(state.recent_events.len(), RECENT_EVENT_CAPACITY);
        assert_eq!(state.recent_events.front().unwrap().message, "5");
    }
}
