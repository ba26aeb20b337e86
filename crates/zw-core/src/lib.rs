//! zombie-watch core library.
//!
//! - Snapshot collection (listening ports, matching processes)
//! - Port and process reconciliation engines
//! - The safety-gated terminator
//! - The tick scheduler and singleton lock
//! - Structured logging and exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod action;
pub mod collect;
pub mod daemon;
pub mod exit_codes;
pub mod logging;
pub mod reconcile;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock_process;
