//! Structured event definitions for logging.
//!
//! Every event carries the run correlation ID, the host ID, and the stage
//! of the watch loop that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of one watch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup, config, lock.
    Init,
    /// Port / process enumeration.
    Scan,
    /// Diffing against the known set.
    Reconcile,
    /// Termination attempts.
    Apply,
    /// Scheduler lifecycle.
    Daemon,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Scan => "scan",
            Stage::Reconcile => "reconcile",
            Stage::Apply => "apply",
            Stage::Daemon => "daemon",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names, used as tracing targets.
pub mod event_names {
    // Scan stage
    pub const SCAN_PORTS: &str = "scan.ports";
    pub const SCAN_PROCESSES: &str = "scan.processes";
    pub const SCAN_TIMEOUT: &str = "scan.timeout";
    pub const SCAN_FAILED: &str = "scan.failed";

    // Reconcile stage
    pub const RECONCILE_PORT_NEW: &str = "reconcile.port_new";
    pub const RECONCILE_PORT_OWNER_CHANGED: &str = "reconcile.port_owner_changed";
    pub const RECONCILE_PROCESS_NEW: &str = "reconcile.process_new";
    pub const RECONCILE_PROCESS_GONE: &str = "reconcile.process_gone";
    pub const RECONCILE_CLUSTER_STALE: &str = "reconcile.cluster_stale";
    pub const RECONCILE_MAX_AGE: &str = "reconcile.max_age";

    // Apply stage
    pub const APPLY_REFUSED_FILTER: &str = "apply.refused_filter";
    pub const APPLY_REFUSED_SELF: &str = "apply.refused_self";
    pub const APPLY_TARGET_GONE: &str = "apply.target_gone";
    pub const APPLY_DRY_RUN: &str = "apply.dry_run";
    pub const APPLY_KILLED: &str = "apply.killed";
    pub const APPLY_FAILED: &str = "apply.failed";

    // Daemon lifecycle
    pub const DAEMON_STARTED: &str = "daemon.started";
    pub const DAEMON_TICK: &str = "daemon.tick";
    pub const DAEMON_STOPPED: &str = "daemon.stopped";

    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_ERROR: &str = "config.error";
    pub const LOCK_ACQUIRED: &str = "lock.acquired";
    pub const LOCK_CONTENDED: &str = "lock.contended";
}

/// A structured log event, kept in the scheduler's recent-event ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    /// Event name (e.g. "apply.killed").
    pub event: String,
    pub run_id: String,
    pub stage: Stage,
    pub host_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl LogEvent {
    pub fn new(
        level: Level,
        event: impl Into<String>,
        run_id: impl Into<String>,
        host_id: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: run_id.into(),
            stage,
            host_id: host_id.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            pid: None,
        }
    }

    /// Add a field to the event.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Correlation IDs shared by every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }

    /// Create an event with this context.
    pub fn event(
        &self,
        level: Level,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        LogEvent::new(level, event, &self.run_id, &self.host_id, stage, message)
    }

    pub fn info(
        &self,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        self.event(Level::Info, event, stage, message)
    }

    pub fn warn(
        &self,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        self.event(Level::Warn, event, stage, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(
            Level::Info,
            "apply.killed",
            "run-0123456789ab",
            "host-abc",
            Stage::Apply,
            "terminated stale dev server",
        )
        .with_field("port", 3001)
        .with_pid(4242);

        let json = event.to_jsonl();
        assert!(json.contains(r#""event":"apply.killed""#));
        assert!(json.contains(r#""level":"info""#));
        assert!(json.contains(r#""stage":"apply""#));
        assert!(json.contains(r#""pid":4242"#));
        assert!(json.contains(r#""port":3001"#));
    }

    #[test]
    fn test_pid_omitted_when_absent() {
        let event = LogEvent::new(Level::Warn, "scan.timeout", "r", "h", Stage::Scan, "slow");
        assert!(!event.to_jsonl().contains("\"pid\""));
    }

    #[test]
    fn test_log_context() {
        let ctx = LogContext::new("run-abc", "host-xyz");
        let event = ctx.warn("daemon.tick", Stage::Daemon, "tick");
        assert_eq!(event.run_id, "run-abc");
        assert_eq!(event.host_id, "host-xyz");
        assert_eq!(event.level, Level::Warn);
        assert_eq!(event.stage, Stage::Daemon);
    }

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [Stage::Init, Stage::Scan, Stage::Reconcile, Stage::Apply, Stage::Daemon] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }
}
