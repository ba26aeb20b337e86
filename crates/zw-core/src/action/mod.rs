//! Termination: the kill primitive and the safety gate in front of it.

pub mod signal;
pub mod terminator;

pub use signal::{KillError, ProcessKiller, SignalKiller};
pub use terminator::{
    TerminationOutcome, TerminationReason, TerminationRecord, Terminator,
};
