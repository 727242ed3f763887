// src/seqset.rs
//
// Sequence sets over message sequence numbers or UIDs, and the two
// resolution paths that turn them into mailbox positions.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// One end of a range: a concrete number or `*`, the highest value in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqBound {
    Num(u32),
    Highest,
}

impl SeqBound {
    fn value(self, highest: u32) -> u32 {
        match self {
            SeqBound::Num(n) => n,
            SeqBound::Highest => highest,
        }
    }
}

impl fmt::Display for SeqBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeqBound::Num(n) => write!(f, "{}", n),
            SeqBound::Highest => f.write_str("*"),
        }
    }
}

/// A single value (`start == stop`) or a closed range in either order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqRange {
    pub start: SeqBound,
    pub stop: SeqBound,
}

impl SeqRange {
    pub fn is_single(&self) -> bool {
        self.start == self.stop
    }

    pub fn is_dynamic(&self) -> bool {
        self.start == SeqBound::Highest || self.stop == SeqBound::Highest
    }

    /// Inclusive bounds with `*` substituted and min/max normalized.
    pub fn bounds(&self, highest: u32) -> (u32, u32) {
        let a = self.start.value(highest);
        let b = self.stop.value(highest);
        (a.min(b), a.max(b))
    }

    pub fn contains(&self, value: u32, highest: u32) -> bool {
        let (lo, hi) = self.bounds(highest);
        lo <= value && value <= hi
    }
}

impl fmt::Display for SeqRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.stop)
        }
    }
}

/// An unordered, possibly overlapping list of ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeqSet {
    ranges: Vec<SeqRange>,
}

impl SeqSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `1:*`
    pub fn all() -> Self {
        let mut set = Self::new();
        set.add_range(SeqBound::Num(1), SeqBound::Highest);
        set
    }

    pub fn single(num: u32) -> Self {
        let mut set = Self::new();
        set.add_num(num);
        set
    }

    pub fn range(start: u32, stop: u32) -> Self {
        let mut set = Self::new();
        set.add_range(SeqBound::Num(start), SeqBound::Num(stop));
        set
    }

    pub fn from_nums<I: IntoIterator<Item = u32>>(nums: I) -> Self {
        let mut set = Self::new();
        for n in nums {
            set.add_num(n);
        }
        set
    }

    pub fn add_num(&mut self, num: u32) {
        self.add_range(SeqBound::Num(num), SeqBound::Num(num));
    }

    pub fn add_range(&mut self, start: SeqBound, stop: SeqBound) {
        self.ranges.push(SeqRange { start, stop });
    }

    pub fn ranges(&self) -> &[SeqRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// True if any part of the set depends on the current highest value.
    pub fn is_dynamic(&self) -> bool {
        self.ranges.iter().any(SeqRange::is_dynamic)
    }

    /// Membership test for a single value; `highest` substitutes `*`.
    pub fn contains(&self, value: u32, highest: u32) -> bool {
        self.ranges.iter().any(|r| r.contains(value, highest))
    }
}

impl fmt::Display for SeqSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ix, range) in self.ranges.iter().enumerate() {
            if ix > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", range)?;
        }
        Ok(())
    }
}

fn parse_bound(raw: &str) -> Result<SeqBound> {
    if raw == "*" {
        return Ok(SeqBound::Highest);
    }
    let n: u32 = raw
        .parse()
        .map_err(|e| Error::InvalidArgument(format!("bad sequence number '{}': {}", raw, e)))?;
    if n == 0 {
        return Err(Error::InvalidArgument("sequence numbers start at 1".to_string()));
    }
    Ok(SeqBound::Num(n))
}

impl FromStr for SeqSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidArgument("empty sequence set".to_string()));
        }
        let mut set = SeqSet::new();
        for part in s.split(',') {
            let mut subs = part.split(':');
            match (subs.next(), subs.next(), subs.next()) {
                (Some(only), None, None) => {
                    let b = parse_bound(only)?;
                    set.add_range(b, b);
                }
                (Some(start), Some(stop), None) => {
                    set.add_range(parse_bound(start)?, parse_bound(stop)?);
                }
                _ => return Err(Error::InvalidArgument(format!("malformed range '{}'", part))),
            }
        }
        Ok(set)
    }
}

/// Resolves a set of sequence numbers against a mailbox of `count` messages.
///
/// Returns ascending, de-duplicated zero-based positions. A static single
/// number outside `1..=count`, or a static range with no overlap with that
/// interval, is `OutOfRange`. Ranges are clamped to the live interval. Parts
/// that involve `*` never fail: on an empty mailbox `*` is zero and the part
/// simply selects nothing.
pub fn resolve_seq_nums(set: &SeqSet, count: u32) -> Result<Vec<usize>> {
    let mut positions = Vec::new();
    for range in set.ranges() {
        let (lo, hi) = range.bounds(count);
        let lo_clamped = lo.max(1);
        let hi_clamped = hi.min(count);

        if lo_clamped > hi_clamped {
            if range.is_dynamic() {
                continue;
            }
            let seq = if lo > count { lo } else { hi };
            return Err(Error::OutOfRange { seq, count });
        }

        positions.extend((lo_clamped..=hi_clamped).map(|n| (n - 1) as usize));
    }
    positions.sort_unstable();
    positions.dedup();
    Ok(positions)
}

/// Resolves a set of UIDs against the ascending UID list of a mailbox.
///
/// Never fails: UIDs that are not assigned simply match nothing. `*` is the
/// largest UID in use, or zero for an empty mailbox.
pub fn resolve_uids(set: &SeqSet, uids: &[u32]) -> Vec<usize> {
    let highest = uids.last().copied().unwrap_or(0);
    let mut positions = Vec::new();
    for range in set.ranges() {
        let (lo, hi) = range.bounds(highest);
        let first = uids.partition_point(|&u| u < lo);
        let last = uids.partition_point(|&u| u <= hi);
        positions.extend(first..last);
    }
    positions.sort_unstable();
    positions.dedup();
    positions
}
