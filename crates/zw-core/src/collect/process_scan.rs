//! Filtered process enumeration via `ps`.
//!
//! A single `ps -eo pid=,ppid=,etime=,args= -ww` invocation works on both
//! procps-ng and BSD ps. Creation timestamps are derived from elapsed time
//! and rendered in the structured `YYYYMMDDhhmmss.ffffff+zzz` form.

use chrono::{DateTime, Local};
use zw_common::ProcessFilter;

use super::tool_runner::ToolRunner;
use super::types::{CollectError, ProcessEntry, ProcessInfo};

/// Format used for structured creation timestamps.
pub const CREATION_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S.000000+000";

/// One parsed `ps` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsRow {
    pub pid: u32,
    pub ppid: u32,
    pub elapsed_secs: u64,
    pub args: String,
}

/// Run `ps` and keep rows whose command line matches the filter.
pub fn scan_processes(
    runner: &ToolRunner,
    filter: &ProcessFilter,
) -> Result<Vec<ProcessEntry>, CollectError> {
    let output = runner.run_checked("ps", &["-eo", "pid=,ppid=,etime=,args=", "-ww"])?;
    Ok(entries_from_ps(&output.stdout_str(), filter, Local::now()))
}

/// Convert raw `ps` output to entries, relative to `now`.
pub fn entries_from_ps(
    content: &str,
    filter: &ProcessFilter,
    now: DateTime<Local>,
) -> Vec<ProcessEntry> {
    content
        .lines()
        .filter_map(parse_ps_line)
        .filter(|row| !is_kernel_thread(row))
        .filter(|row| filter.matches(&row.args))
        .map(|row| {
            let created = now - chrono::Duration::seconds(row.elapsed_secs as i64);
            ProcessEntry {
                pid: row.pid,
                command: row.args,
                parent_pid: (row.ppid != 0).then_some(row.ppid),
                creation_timestamp: Some(created.format(CREATION_TIMESTAMP_FORMAT).to_string()),
            }
        })
        .collect()
}

/// Parse one `pid ppid etime args...` line.
pub fn parse_ps_line(line: &str) -> Option<PsRow> {
    let mut rest = line.trim_start();
    let mut next_field = || {
        let end = rest.find(char::is_whitespace)?;
        let (field, tail) = rest.split_at(end);
        rest = tail.trim_start();
        Some(field)
    };

    let pid = next_field()?.parse().ok()?;
    let ppid = next_field()?.parse().ok()?;
    let elapsed_secs = parse_etime(next_field()?)?;
    let args = rest.trim_end();
    if args.is_empty() {
        return None;
    }

    Some(PsRow {
        pid,
        ppid,
        elapsed_secs,
        args: args.to_string(),
    })
}

/// Parse etime format: `[[dd-]hh:]mm:ss`.
pub fn parse_etime(s: &str) -> Option<u64> {
    let (days, time_part) = match s.split_once('-') {
        Some((d, t)) => (d.parse::<u64>().ok()?, t),
        None => (0, s),
    };

    let parts: Vec<u64> = time_part
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<_>>()?;

    let secs = match parts.as_slice() {
        [h, m, s] => h * 3600 + m * 60 + s,
        [m, s] => m * 60 + s,
        [s] => *s,
        _ => return None,
    };

    Some(days * 86_400 + secs)
}

/// Kernel threads are identified by parent pid, never by name: zombie
/// processes also render bracketed names.
fn is_kernel_thread(row: &PsRow) -> bool {
    if row.pid == 1 {
        return false;
    }
    row.ppid == 0 || (cfg!(target_os = "linux") && row.ppid == 2)
}

/// Live command line for `pid`, or `None` if it no longer exists.
pub fn lookup_process(runner: &ToolRunner, pid: u32) -> Option<ProcessInfo> {
    #[cfg(target_os = "linux")]
    {
        let _ = runner;
        lookup_procfs(std::path::Path::new("/proc"), pid)
    }

    #[cfg(not(target_os = "linux"))]
    {
        let pid_arg = pid.to_string();
        let output = runner.run("ps", &["-o", "args=", "-p", &pid_arg]).ok()?;
        let command = output.stdout_str().trim().to_string();
        (output.success() && !command.is_empty()).then_some(ProcessInfo { pid, command })
    }
}

/// Read `<proc_root>/<pid>/cmdline`, falling back to `comm` for processes
/// with an empty argv.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn lookup_procfs(proc_root: &std::path::Path, pid: u32) -> Option<ProcessInfo> {
    let dir = proc_root.join(pid.to_string());
    let raw = std::fs::read(dir.join("cmdline")).ok()?;
    let command = raw
        .split(|&b| b == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect::<Vec<_>>()
        .join(" ");

    let command = if command.is_empty() {
        std::fs::read_to_string(dir.join("comm")).ok()?.trim().to_string()
    } else {
        command
    };

    Some(ProcessInfo { pid, command })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PS_OUTPUT: &str = "    1     0    10-02:00:00 /sbin/init splash
    2     0    10-02:00:00 [kthreadd]
   57     2    10-01:59:59 [kworker/0:1]
 4100  4000       01:05:07 node /home/dev/app/node_modules/.bin/vite --port 5173
 4101  4100          00:42 /usr/bin/esbuild --service=0.19.0 --ping
 5200     1          12:00 /usr/sbin/sshd -D
";

    fn at_noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn etime_forms() {
        assert_eq!(parse_etime("05"), Some(5));
        assert_eq!(parse_etime("01:05"), Some(65));
        assert_eq!(parse_etime("01:05:07"), Some(3907));
        assert_eq!(parse_etime("2-00:00:01"), Some(172_801));
        assert_eq!(parse_etime("x:01"), None);
        assert_eq!(parse_etime("1:2:3:4"), None);
    }

    #[test]
    fn line_keeps_full_args() {
        let row = parse_ps_line(" 4100  4000       01:05:07 node  app.js --flag").unwrap();
        assert_eq!(row.pid, 4100);
        assert_eq!(row.ppid, 4000);
        assert_eq!(row.elapsed_secs, 3907);
        assert_eq!(row.args, "node  app.js --flag");
    }

    #[test]
    fn line_without_args_rejected() {
        assert!(parse_ps_line(" 4100 4000 00:01").is_none());
        assert!(parse_ps_line("").is_none());
    }

    #[test]
    fn filter_and_kernel_threads() {
        let filter = ProcessFilter::parse("vite;esbuild;kthreadd");
        let entries = entries_from_ps(PS_OUTPUT, &filter, at_noon());
        let pids: Vec<u32> = entries.iter().map(|e| e.pid).collect();
        assert_eq!(pids, vec![4100, 4101]);
        assert_eq!(entries[0].parent_pid, Some(4000));
    }

    #[test]
    fn creation_timestamp_from_elapsed() {
        let filter = ProcessFilter::parse("vite");
        let entries = entries_from_ps(PS_OUTPUT, &filter, at_noon());
        assert_eq!(
            entries[0].creation_timestamp.as_deref(),
            Some("20260314105453.000000+000")
        );
    }

    #[test]
    fn init_is_not_a_kernel_thread() {
        let filter = ProcessFilter::parse("init");
        let entries = entries_from_ps(PS_OUTPUT, &filter, at_noon());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].pid, 1);
        assert_eq!(entries[0].parent_pid, None);
    }

    #[test]
    fn procfs_lookup_joins_argv() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("4100");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("cmdline"), b"node\0server.js\0--port\03000\0").unwrap();

        let info = lookup_procfs(root.path(), 4100).unwrap();
        assert_eq!(info.command, "node server.js --port 3000");
        assert!(lookup_procfs(root.path(), 4200).is_none());
    }

    #[test]
    fn procfs_lookup_falls_back_to_comm() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("9");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("cmdline"), b"").unwrap();
        std::fs::write(dir.join("comm"), "esbuild\n").unwrap();

        assert_eq!(lookup_procfs(root.path(), 9).unwrap().command, "esbuild");
    }
}
