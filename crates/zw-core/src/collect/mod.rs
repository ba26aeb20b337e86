//! Host observation layer.
//!
//! - Listening TCP ports (procfs on Linux, lsof elsewhere)
//! - Filtered process enumeration via ps
//! - Point lookups for kill-target re-verification
//! - Tool runner for bounded external command execution
//!
//! Everything is exposed to the engine through [`SnapshotProvider`] as typed
//! records; no raw tool output crosses this boundary.

pub mod network;
pub mod process_scan;
mod provider;
pub mod tool_runner;
mod types;

pub use provider::{SnapshotProvider, SystemProvider};
pub use tool_runner::{ToolError, ToolOutput, ToolRunner};
pub use types::{CollectError, PortSnapshot, ProcessEntry, ProcessInfo};
