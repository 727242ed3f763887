// src/utils.rs

use chrono::{DateTime, Duration, NaiveDate, Utc};
use eyre::{eyre, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Parse a string like "7d" into a chrono::Duration of days.
/// Returns an error if the format is unsupported.
pub fn parse_days(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Some(num) = s.strip_suffix('d') {
        let days: i64 = num.parse().map_err(|e| eyre!("Invalid day count '{}': {}", s, e))?;
        Ok(Duration::days(days))
    } else {
        Err(eyre!("Unsupported duration format '{}'; expected '<n>d'", s))
    }
}

/// Parse a search date: `YYYY-MM-DD`, or `<n>d` meaning n days before `now`.
pub fn parse_date(s: &str, now: DateTime<Utc>) -> Result<NaiveDate> {
    let s = s.trim();
    if s.ends_with('d') {
        return Ok((now - parse_days(s)?).date_naive());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| eyre!("Invalid date '{}': {}; expected YYYY-MM-DD or <n>d", s, e))
}

/// Split `Name:value` into a header search pair. The value may be empty.
pub fn parse_header_arg(s: &str) -> Result<(String, String)> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| eyre!("Invalid header criterion '{}'; expected NAME:VALUE", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(eyre!("Header name missing in '{}'", s));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Read a message file, normalizing bare LF line endings to CRLF.
pub fn read_message_file(path: &Path) -> Result<Vec<u8>> {
    let raw = fs::read(path).map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
    if raw.windows(2).any(|w| w == b"\r\n") {
        return Ok(raw);
    }
    debug!("Normalizing line endings of {}", path.display());
    let mut out = Vec::with_capacity(raw.len() + raw.len() / 40);
    for &b in &raw {
        if b == b'\n' {
            out.push(b'\r');
        }
        out.push(b);
    }
    Ok(out)
}
