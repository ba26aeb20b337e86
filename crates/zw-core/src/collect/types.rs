//! Typed snapshot records handed to the reconcilers.
//!
//! The reconcilers never see raw tool output; everything crossing the
//! provider boundary is one of these.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use super::tool_runner::ToolError;

/// Listening TCP port → owning pid.
pub type PortSnapshot = BTreeMap<u16, u32>;

/// One process row from a filtered process enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Full command line.
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_pid: Option<u32>,
    /// Creation time in `YYYYMMDDhhmmss[.ffffff][+zzz]` form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
}

/// Result of a live point lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub command: String,
}

/// Enumeration failures. The reconcilers degrade these to an empty snapshot.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("tool failed: {0}")]
    Tool(#[from] ToolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("enumeration abandoned after {0:?}")]
    Timeout(Duration),

    #[error("enumeration worker exited without a result")]
    WorkerLost,

    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),
}

impl From<CollectError> for zw_common::Error {
    fn from(err: CollectError) -> Self {
        match err {
            CollectError::Timeout(d) => zw_common::Error::CollectionTimeout {
                millis: d.as_millis() as u64,
            },
            CollectError::Unsupported(what) => {
                zw_common::Error::UnsupportedPlatform(what.to_string())
            }
            other => zw_common::Error::Collection(other.to_string()),
        }
    }
}
