//! Start-time resolution for tracked processes.
//!
//! A structured creation timestamp (`YYYYMMDDhhmmss[.ffffff][+zzz]`) is
//! authoritative when present; only its leading 14 digits are read and they
//! are interpreted in the host's local timezone. Anything unparseable falls
//! back to the time the watcher first saw the pid.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// Parse the leading `YYYYMMDDhhmmss` of a structured timestamp.
pub fn parse_creation_timestamp(raw: &str) -> Option<DateTime<Local>> {
    let digits = raw.trim().get(..14)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S").ok()?;
    // Nonexistent local times (DST gap) fall back like any other parse failure.
    Local.from_local_datetime(&naive).earliest()
}

/// Effective start of a process: parsed creation time, else first sighting.
pub fn resolve_start(
    creation_timestamp: Option<&str>,
    first_seen_at: DateTime<Local>,
) -> DateTime<Local> {
    creation_timestamp
        .and_then(parse_creation_timestamp)
        .unwrap_or(first_seen_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn parses_full_structured_form() {
        assert_eq!(
            parse_creation_timestamp("20260314101530.123456+060"),
            Some(local(2026, 3, 14, 10, 15, 30))
        );
    }

    #[test]
    fn parses_bare_digits() {
        assert_eq!(
            parse_creation_timestamp("20260314101530"),
            Some(local(2026, 3, 14, 10, 15, 30))
        );
    }

    #[test]
    fn rejects_short_or_garbage() {
        assert_eq!(parse_creation_timestamp("2026031410"), None);
        assert_eq!(parse_creation_timestamp("2026-03-14T10:15:30"), None);
        assert_eq!(parse_creation_timestamp("20261399101530"), None);
        assert_eq!(parse_creation_timestamp(""), None);
    }

    #[test]
    fn falls_back_to_first_seen() {
        let seen = local(2026, 3, 14, 12, 0, 0);
        assert_eq!(resolve_start(None, seen), seen);
        assert_eq!(resolve_start(Some("not a time"), seen), seen);
        assert_eq!(
            resolve_start(Some("20260314090000"), seen),
            local(2026, 3, 14, 9, 0, 0)
        );
    }
}
