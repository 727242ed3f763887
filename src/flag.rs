// src/flag.rs
//
// Message flag vocabulary and the three STORE operations.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;

pub const SEEN: &str = "\\Seen";
pub const ANSWERED: &str = "\\Answered";
pub const FLAGGED: &str = "\\Flagged";
pub const DELETED: &str = "\\Deleted";
pub const DRAFT: &str = "\\Draft";
/// Session-scoped; never stored with a message.
pub const RECENT: &str = "\\Recent";
/// PERMANENTFLAGS marker: clients may create new keywords.
pub const WILDCARD: &str = "\\*";

/// System flags every mailbox advertises.
pub const SYSTEM_FLAGS: [&str; 5] = [SEEN, ANSWERED, FLAGGED, DELETED, DRAFT];

/// Flags are case-preserved strings; sets are ordered for stable output.
pub type FlagSet = BTreeSet<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagOp {
    /// Union with the given flags (`+FLAGS`).
    Add,
    /// Difference with the given flags (`-FLAGS`).
    Remove,
    /// Exact new set (`FLAGS`).
    Replace,
}

impl fmt::Display for FlagOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlagOp::Add => "+FLAGS",
            FlagOp::Remove => "-FLAGS",
            FlagOp::Replace => "FLAGS",
        };
        f.write_str(s)
    }
}

pub fn is_recent(flag: &str) -> bool {
    flag == RECENT
}

/// Builds a storable flag set, dropping `\Recent` and empty tokens.
pub fn storable<I, S>(flags: I) -> FlagSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    flags
        .into_iter()
        .map(|f| f.as_ref().trim().to_string())
        .filter(|f| !f.is_empty() && !is_recent(f))
        .collect()
}

/// Applies `op` to `current`; returns true if the set changed.
pub fn apply(current: &mut FlagSet, op: FlagOp, values: &FlagSet) -> bool {
    match op {
        FlagOp::Add => {
            let before = current.len();
            current.extend(values.iter().cloned());
            current.len() != before
        }
        FlagOp::Remove => {
            let before = current.len();
            current.retain(|f| !values.contains(f));
            current.len() != before
        }
        FlagOp::Replace => {
            if current == values {
                false
            } else {
                *current = values.clone();
                true
            }
        }
    }
}

/// Renders a stored set for one observer, adding `\Recent` when it applies.
pub fn with_recent(stored: &FlagSet, recent: bool) -> Vec<String> {
    let mut out: Vec<String> = stored.iter().cloned().collect();
    if recent {
        out.push(RECENT.to_string());
        out.sort();
    }
    out
}
