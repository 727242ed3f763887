// src/search.rs
//
// Boolean search criteria and their evaluation against one message.

use chrono::NaiveDate;

use crate::flag;
use crate::message::{Message, MessageContent};
use crate::seqset::SeqSet;

/// A criteria tree. Every populated field must match (AND); `not` entries
/// must fail; each `or` pair needs at least one side to match.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub seq_num: Option<SeqSet>,
    pub uid: Option<SeqSet>,

    /// Internal date, day granularity, inclusive.
    pub since: Option<NaiveDate>,
    /// Internal date, day granularity, exclusive.
    pub before: Option<NaiveDate>,
    /// `Date:` header, same rules as `since`.
    pub sent_since: Option<NaiveDate>,
    pub sent_before: Option<NaiveDate>,

    /// (name, substring). An empty substring tests for presence.
    pub header: Vec<(String, String)>,
    pub body: Vec<String>,
    /// Headers or body.
    pub text: Vec<String>,

    pub with_flags: Vec<String>,
    pub without_flags: Vec<String>,

    pub larger: Option<u32>,
    pub smaller: Option<u32>,

    pub not: Vec<SearchCriteria>,
    pub or: Vec<(SearchCriteria, SearchCriteria)>,
}

/// Everything a criterion may look at for one message.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    pub msg: &'a Message,
    pub seq_num: u32,
    /// Message count, substituted for `*` in sequence sets.
    pub count: u32,
    /// Largest UID in the mailbox, substituted for `*` in UID sets.
    pub max_uid: u32,
    /// Whether the searching session sees this message as `\Recent`.
    pub recent: bool,
    /// Decoded content; only required when `needs_content()` is true.
    pub content: Option<&'a MessageContent>,
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        self.seq_num.is_none()
            && self.uid.is_none()
            && self.since.is_none()
            && self.before.is_none()
            && self.sent_since.is_none()
            && self.sent_before.is_none()
            && self.header.is_empty()
            && self.body.is_empty()
            && self.text.is_empty()
            && self.with_flags.is_empty()
            && self.without_flags.is_empty()
            && self.larger.is_none()
            && self.smaller.is_none()
            && self.not.is_empty()
            && self.or.is_empty()
    }

    /// True if evaluation reads headers or body text anywhere in the tree.
    pub fn needs_content(&self) -> bool {
        self.sent_since.is_some()
            || self.sent_before.is_some()
            || !self.header.is_empty()
            || !self.body.is_empty()
            || !self.text.is_empty()
            || self.not.iter().any(SearchCriteria::needs_content)
            || self.or.iter().any(|(a, b)| a.needs_content() || b.needs_content())
    }

    /// Returns true if this criteria tree matches the message.
    pub fn matches(&self, ctx: &SearchContext) -> bool {
        let msg = ctx.msg;

        // SEQUENCE / UID membership
        if let Some(ref set) = self.seq_num {
            if !set.contains(ctx.seq_num, ctx.count) {
                return false;
            }
        }
        if let Some(ref set) = self.uid {
            if !set.contains(msg.uid, ctx.max_uid) {
                return false;
            }
        }

        // INTERNAL DATE
        let day = msg.internal_date.date_naive();
        if let Some(since) = self.since {
            if day < since {
                return false;
            }
        }
        if let Some(before) = self.before {
            if day >= before {
                return false;
            }
        }

        // SIZE
        if let Some(larger) = self.larger {
            if msg.size <= larger {
                return false;
            }
        }
        if let Some(smaller) = self.smaller {
            if msg.size >= smaller {
                return false;
            }
        }

        // FLAGS: exact, case-sensitive tokens
        let has = |f: &String| {
            if flag::is_recent(f) {
                ctx.recent
            } else {
                msg.has_flag(f)
            }
        };
        if !self.with_flags.iter().all(has) {
            return false;
        }
        if self.without_flags.iter().any(has) {
            return false;
        }

        // CONTENT
        if self.needs_own_content() {
            let Some(content) = ctx.content else {
                return false;
            };
            if !self.content_matches(content) {
                return false;
            }
        }

        if self.not.iter().any(|c| c.matches(ctx)) {
            return false;
        }
        self.or.iter().all(|(a, b)| a.matches(ctx) || b.matches(ctx))
    }

    fn needs_own_content(&self) -> bool {
        self.sent_since.is_some()
            || self.sent_before.is_some()
            || !self.header.is_empty()
            || !self.body.is_empty()
            || !self.text.is_empty()
    }

    fn content_matches(&self, content: &MessageContent) -> bool {
        if self.sent_since.is_some() || self.sent_before.is_some() {
            let Some(sent) = content.sent_date.map(|d| d.date_naive()) else {
                return false;
            };
            if self.sent_since.is_some_and(|since| sent < since) {
                return false;
            }
            if self.sent_before.is_some_and(|before| sent >= before) {
                return false;
            }
        }

        for (name, needle) in &self.header {
            let found = if needle.is_empty() {
                content.has_header(name)
            } else {
                content.header_values(name).any(|v| contains_ci(v, needle))
            };
            if !found {
                return false;
            }
        }

        if !self.body.iter().all(|needle| contains_ci(&content.body, needle)) {
            return false;
        }

        self.text.iter().all(|needle| {
            contains_ci(&content.body, needle)
                || content
                    .headers
                    .iter()
                    .any(|(k, v)| contains_ci(k, needle) || contains_ci(v, needle))
        })
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
