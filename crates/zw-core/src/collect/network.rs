//! Listening TCP port enumeration.
//!
//! # Data Sources
//! - `/proc/net/tcp`, `/proc/net/tcp6` for LISTEN sockets (Linux)
//! - `/proc/[pid]/fd/` for socket inode → pid mapping (Linux)
//! - `lsof -nP -iTCP -sTCP:LISTEN -Fpn` elsewhere

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::types::{CollectError, PortSnapshot};

/// `st` column value for LISTEN in /proc/net/tcp.
const TCP_LISTEN: u8 = 0x0A;

/// A LISTEN row from /proc/net/tcp{,6}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenSocket {
    pub port: u16,
    pub inode: u64,
}

/// Parse /proc/net/tcp content, keeping LISTEN rows only.
pub fn parse_proc_net_tcp_listen(content: &str) -> Vec<ListenSocket> {
    let mut sockets = Vec::new();

    for line in content.lines().skip(1) {
        // sl local_address rem_address st tx:rx tr:when retrnsmt uid timeout inode
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 10 {
            continue;
        }

        let state = u8::from_str_radix(parts[3], 16).unwrap_or(0);
        if state != TCP_LISTEN {
            continue;
        }

        let port = match parts[1].rsplit_once(':') {
            Some((_, port_hex)) => u16::from_str_radix(port_hex, 16).unwrap_or(0),
            None => 0,
        };
        let inode = parts[9].parse::<u64>().unwrap_or(0);
        if port == 0 || inode == 0 {
            continue;
        }

        sockets.push(ListenSocket { port, inode });
    }

    sockets
}

/// Socket inode → owning pid, from `<proc_root>/[pid]/fd/*` links.
///
/// Unreadable pid directories (other users' processes) are skipped. When
/// several pids share an inode the lowest pid is kept.
pub fn socket_inode_owners(proc_root: &Path) -> Result<HashMap<u64, u32>, CollectError> {
    let mut owners: HashMap<u64, u32> = HashMap::new();

    for entry in fs::read_dir(proc_root)?.flatten() {
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };

        let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
            continue;
        };
        for fd in fds.flatten() {
            let Ok(target) = fs::read_link(fd.path()) else {
                continue;
            };
            // Socket links look like "socket:[12345]"
            let target = target.to_string_lossy();
            if let Some(inode) = target
                .strip_prefix("socket:[")
                .and_then(|s| s.strip_suffix(']'))
                .and_then(|s| s.parse::<u64>().ok())
            {
                owners
                    .entry(inode)
                    .and_modify(|owner| *owner = (*owner).min(pid))
                    .or_insert(pid);
            }
        }
    }

    Ok(owners)
}

/// Listening ports from a procfs tree.
pub fn listening_ports_from_proc(proc_root: &Path) -> Result<PortSnapshot, CollectError> {
    let mut sockets = Vec::new();
    let mut read_any = false;
    for table in ["net/tcp", "net/tcp6"] {
        if let Ok(content) = fs::read_to_string(proc_root.join(table)) {
            read_any = true;
            sockets.extend(parse_proc_net_tcp_listen(&content));
        }
    }
    if !read_any {
        return Err(CollectError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no readable tcp tables under procfs",
        )));
    }

    let owners = socket_inode_owners(proc_root)?;
    Ok(fold_lowest_pid(sockets.iter().filter_map(|s| {
        owners.get(&s.inode).map(|&pid| (s.port, pid))
    })))
}

/// Parse `lsof -Fpn` output into (port, pid) pairs.
///
/// Records are `p<pid>` followed by one or more `n<addr>:<port>` lines;
/// other field lines (`f`, `c`, ...) are ignored.
pub fn parse_lsof_listen(output: &str) -> Vec<(u16, u32)> {
    let mut pairs = Vec::new();
    let mut current_pid: Option<u32> = None;

    for line in output.lines() {
        let Some(tag) = line.chars().next() else {
            continue;
        };
        let value = &line[tag.len_utf8()..];
        match tag {
            'p' => current_pid = value.parse().ok(),
            'n' => {
                // Connected sockets carry "->"; LISTEN rows never do.
                if value.contains("->") {
                    continue;
                }
                let port = value
                    .rsplit_once(':')
                    .and_then(|(_, p)| p.parse::<u16>().ok());
                if let (Some(pid), Some(port)) = (current_pid, port) {
                    pairs.push((port, pid));
                }
            }
            _ => {}
        }
    }

    pairs
}

/// Build a snapshot, resolving duplicate ports to the lowest pid.
pub fn fold_lowest_pid<I>(pairs: I) -> PortSnapshot
where
    I: IntoIterator<Item = (u16, u32)>,
{
    let mut snapshot = PortSnapshot::new();
    for (port, pid) in pairs {
        snapshot
            .entry(port)
            .and_modify(|owner| *owner = (*owner).min(pid))
            .or_insert(pid);
    }
    snapshot
}
