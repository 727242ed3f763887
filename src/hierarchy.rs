// src/hierarchy.rs
//
// Per-user tree of mailbox names. Names are full paths joined by the
// delimiter; parents are implied by prefixes and created on demand.

use log::{debug, info};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::cfg::{DeletePolicy, RenamePolicy};
use crate::error::{Error, Result};
use crate::mailbox::Mailbox;
use crate::store::MessageStore;

pub const INBOX: &str = "INBOX";
pub const HAS_CHILDREN: &str = "\\HasChildren";
pub const HAS_NO_CHILDREN: &str = "\\HasNoChildren";

/// Hands out uidValidity values; never repeats within one backend.
#[derive(Debug)]
pub struct ValidityCounter(AtomicU32);

impl ValidityCounter {
    pub fn starting_at(seed: u32) -> Self {
        Self(AtomicU32::new(seed.max(1)))
    }

    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// One LIST entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailboxInfo {
    pub name: String,
    pub delimiter: String,
    pub attributes: Vec<String>,
}

/// `INBOX` is case-insensitive; every other name is taken verbatim.
pub fn canonical_name(name: &str) -> String {
    if name.eq_ignore_ascii_case(INBOX) {
        INBOX.to_string()
    } else {
        name.to_string()
    }
}

pub struct Hierarchy {
    delimiter: String,
    mailboxes: BTreeMap<String, Arc<Mailbox>>,
    store: Arc<dyn MessageStore>,
    validity: Arc<ValidityCounter>,
}

impl std::fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hierarchy")
            .field("delimiter", &self.delimiter)
            .field("mailboxes", &self.mailboxes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Hierarchy {
    pub fn new(delimiter: &str, store: Arc<dyn MessageStore>, validity: Arc<ValidityCounter>) -> Self {
        Self {
            delimiter: delimiter.to_string(),
            mailboxes: BTreeMap::new(),
            store,
            validity,
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.mailboxes.keys()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mailboxes.contains_key(&canonical_name(name))
    }

    pub fn get(&self, name: &str) -> Result<Arc<Mailbox>> {
        self.mailboxes
            .get(&canonical_name(name))
            .cloned()
            .ok_or(Error::NoSuchMailbox)
    }

    fn normalize(&self, name: &str) -> Result<String> {
        let trimmed = name.strip_suffix(self.delimiter.as_str()).unwrap_or(name);
        if trimmed.is_empty() || trimmed.split(self.delimiter.as_str()).any(str::is_empty) {
            return Err(Error::InvalidArgument(format!("invalid mailbox name '{}'", name)));
        }
        Ok(canonical_name(trimmed))
    }

    /// Every proper prefix of `name` at a delimiter boundary.
    fn ancestors(&self, name: &str) -> Vec<String> {
        name.match_indices(self.delimiter.as_str())
            .map(|(ix, _)| name[..ix].to_string())
            .collect()
    }

    fn is_descendant(&self, name: &str, of: &str) -> bool {
        name.len() > of.len() + self.delimiter.len()
            && name.starts_with(of)
            && name[of.len()..].starts_with(self.delimiter.as_str())
    }

    pub fn has_children(&self, name: &str) -> bool {
        self.mailboxes.keys().any(|other| self.is_descendant(other, name))
    }

    fn insert_new(&mut self, name: &str) -> Arc<Mailbox> {
        let mbox = Arc::new(Mailbox::new(name, self.validity.next(), self.store.clone()));
        self.mailboxes.insert(name.to_string(), mbox.clone());
        mbox
    }

    fn ensure_parents(&mut self, name: &str) {
        for parent in self.ancestors(name) {
            let parent = canonical_name(&parent);
            if !self.mailboxes.contains_key(&parent) {
                debug!("Creating intermediate mailbox '{}'", parent);
                self.insert_new(&parent);
            }
        }
    }

    /// Creates `name` and any missing parents.
    pub fn create(&mut self, name: &str) -> Result<Arc<Mailbox>> {
        let name = self.normalize(name)?;
        if self.mailboxes.contains_key(&name) {
            return Err(Error::MailboxExists);
        }
        self.ensure_parents(&name);
        info!("Created mailbox '{}'", name);
        Ok(self.insert_new(&name))
    }

    pub fn delete(&mut self, name: &str, policy: DeletePolicy) -> Result<()> {
        let name = canonical_name(name);
        if name == INBOX {
            return Err(Error::InvalidArgument("INBOX cannot be deleted".to_string()));
        }
        if !self.mailboxes.contains_key(&name) {
            return Err(Error::NoSuchMailbox);
        }

        let children: Vec<String> = self
            .mailboxes
            .keys()
            .filter(|other| self.is_descendant(other, &name))
            .cloned()
            .collect();

        let doomed = match policy {
            DeletePolicy::KeepChildren => vec![name.clone()],
            DeletePolicy::RefuseWithChildren if !children.is_empty() => {
                return Err(Error::InvalidArgument(format!(
                    "mailbox '{}' has {} child mailbox(es)",
                    name,
                    children.len()
                )));
            }
            DeletePolicy::RefuseWithChildren => vec![name.clone()],
            DeletePolicy::Subtree => std::iter::once(name.clone()).chain(children).collect(),
        };

        for doomed_name in doomed {
            if let Some(mbox) = self.mailboxes.remove(&doomed_name) {
                mbox.destroy()?;
            }
        }
        info!("Deleted mailbox '{}' ({})", name, policy);
        Ok(())
    }

    /// Renames `existing` and every descendant by prefix rewrite. Renaming
    /// INBOX moves its messages to `new_name` and leaves a fresh INBOX.
    pub fn rename(&mut self, existing: &str, new_name: &str, policy: RenamePolicy) -> Result<()> {
        let existing = canonical_name(existing);
        let new_name = self.normalize(new_name)?;

        let source = self.get(&existing)?;
        if self.mailboxes.contains_key(&new_name) {
            return Err(Error::MailboxExists);
        }
        if self.is_descendant(&new_name, &existing) {
            return Err(Error::InvalidArgument(format!(
                "cannot rename '{}' into its own subtree",
                existing
            )));
        }

        if existing == INBOX {
            self.ensure_parents(&new_name);
            let target = self.insert_new(&new_name);
            source.drain_into(&target)?;
            self.mailboxes.remove(INBOX);
            self.insert_new(INBOX);
            info!("Moved INBOX contents to '{}'", new_name);
            return Ok(());
        }

        let mut renames: Vec<(String, String)> = vec![(existing.clone(), new_name.clone())];
        for child in self.mailboxes.keys() {
            if self.is_descendant(child, &existing) {
                let suffix = &child[existing.len()..];
                renames.push((child.clone(), format!("{}{}", new_name, suffix)));
            }
        }
        // Every rewritten name must be free before anything moves.
        if let Some((_, taken)) = renames.iter().find(|(_, to)| self.mailboxes.contains_key(to)) {
            debug!("Rename of '{}' blocked by existing '{}'", existing, taken);
            return Err(Error::MailboxExists);
        }

        self.ensure_parents(&new_name);
        for (from, to) in renames {
            let Some(mbox) = self.mailboxes.remove(&from) else {
                continue;
            };
            let reset = match policy {
                RenamePolicy::Preserve => None,
                RenamePolicy::Reset => Some(self.validity.next()),
            };
            mbox.rename(&to, reset)?;
            self.mailboxes.insert(to, mbox);
        }
        info!("Renamed mailbox '{}' -> '{}' ({})", existing, new_name, policy);
        Ok(())
    }

    pub fn info(&self, name: &str) -> MailboxInfo {
        let attr = if self.has_children(name) {
            HAS_CHILDREN
        } else {
            HAS_NO_CHILDREN
        };
        MailboxInfo {
            name: name.to_string(),
            delimiter: self.delimiter.clone(),
            attributes: vec![attr.to_string()],
        }
    }

    pub fn list(&self, subscribed_only: bool) -> Result<Vec<MailboxInfo>> {
        let mut out = Vec::new();
        for (name, mbox) in &self.mailboxes {
            if subscribed_only && !mbox.is_subscribed()? {
                continue;
            }
            out.push(self.info(name));
        }
        Ok(out)
    }

    /// LIST with a reference and a pattern: `*` matches anything, `%`
    /// anything but the delimiter.
    pub fn list_matching(&self, reference: &str, pattern: &str, subscribed_only: bool) -> Result<Vec<MailboxInfo>> {
        let full = format!("{}{}", reference, pattern);
        let re = self.pattern_regex(&full, false)?;
        let re_ci = self.pattern_regex(&full, true)?;

        Ok(self
            .list(subscribed_only)?
            .into_iter()
            .filter(|info| re.is_match(&info.name) || (info.name == INBOX && re_ci.is_match(&info.name)))
            .collect())
    }

    fn pattern_regex(&self, pattern: &str, case_insensitive: bool) -> Result<Regex> {
        let delim = regex::escape(&self.delimiter);
        let mut expr = String::from("^");
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '%' => expr.push_str(&format!("[^{}]*", delim)),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');
        RegexBuilder::new(&expr)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| Error::InvalidArgument(format!("bad list pattern '{}': {}", pattern, e)))
    }

    /// Destroys every mailbox (user deletion).
    pub fn clear(&mut self) -> Result<()> {
        for (_, mbox) in std::mem::take(&mut self.mailboxes) {
            mbox.destroy()?;
        }
        Ok(())
    }
}
