//! Duplicate-launch clustering.
//!
//! Records sharing a normalized command are grouped by parent lineage. Each
//! group is one logical instance; when a command has more than one instance,
//! every instance except the newest is stale.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use super::processes::ProcessRecord;
use super::start_time::resolve_start;

/// Cluster identity. Parentless records are their own singleton cluster.
///
/// Ordering (used to break start-time ties): every `Clustered` key sorts
/// before every `Standalone` key, each ascending by pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClusterKey {
    Clustered(u32),
    Standalone(u32),
}

impl ClusterKey {
    pub fn for_record(record: &ProcessRecord) -> Self {
        match record.parent_pid {
            Some(ppid) => ClusterKey::Clustered(ppid),
            None => ClusterKey::Standalone(record.pid),
        }
    }
}

/// One logical instance of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub key: ClusterKey,
    /// Start of the earliest member.
    pub start: DateTime<Local>,
    /// Member pids ordered by `(start, pid)`.
    pub members: Vec<u32>,
}

/// Command string used for grouping.
pub fn normalize_command(command: &str) -> &str {
    command.trim()
}

/// Group records by normalized command.
pub fn group_by_command<'r, I>(records: I) -> BTreeMap<String, Vec<&'r ProcessRecord>>
where
    I: IntoIterator<Item = &'r ProcessRecord>,
{
    let mut groups: BTreeMap<String, Vec<&ProcessRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(normalize_command(&record.command).to_string())
            .or_default()
            .push(record);
    }
    groups
}

/// Build clusters for one command, oldest first.
pub fn build_clusters(records: &[&ProcessRecord]) -> Vec<Cluster> {
    let mut by_key: BTreeMap<ClusterKey, Vec<(DateTime<Local>, u32)>> = BTreeMap::new();
    for record in records {
        let start = resolve_start(record.creation_timestamp.as_deref(), record.first_seen_at);
        by_key
            .entry(ClusterKey::for_record(record))
            .or_default()
            .push((start, record.pid));
    }

    let mut clusters: Vec<Cluster> = by_key
        .into_iter()
        .filter_map(|(key, mut members)| {
            members.sort();
            let start = members.first()?.0;
            Some(Cluster {
                key,
                start,
                members: members.into_iter().map(|(_, pid)| pid).collect(),
            })
        })
        .collect();

    clusters.sort_by(|a, b| a.start.cmp(&b.start).then(a.key.cmp(&b.key)));
    clusters
}

/// All clusters except the newest. Empty when there is at most one.
pub fn stale_clusters(clusters: &[Cluster]) -> &[Cluster] {
    match clusters.len() {
        0 | 1 => &[],
        n => &clusters[..n - 1],
    }
}
