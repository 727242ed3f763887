// src/user.rs
//
// User-level operations: the mailbox hierarchy, message delivery and
// opening mailbox views.

use chrono::{DateTime, Utc};
use log::{debug, info};
use std::sync::{Arc, RwLock};

use crate::backend::Shared;
use crate::error::Result;
use crate::flag;
use crate::hierarchy::{Hierarchy, MailboxInfo};
use crate::mailbox::{Mailbox, MailboxHandle, MailboxStatus, StatusItem};
use crate::updates::Conn;

pub struct User {
    name: String,
    hierarchy: RwLock<Hierarchy>,
    message_limit: RwLock<Option<u32>>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("hierarchy", &self.hierarchy)
            .finish()
    }
}

impl User {
    pub(crate) fn new(name: &str, shared: Arc<Shared>) -> Self {
        let hierarchy = Hierarchy::new(&shared.settings.delimiter, shared.store.clone(), shared.validity.clone());
        Self {
            name: name.to_string(),
            hierarchy: RwLock::new(hierarchy),
            message_limit: RwLock::new(None),
            shared,
        }
    }

    pub fn username(&self) -> &str {
        &self.name
    }

    pub fn delimiter(&self) -> &str {
        &self.shared.settings.delimiter
    }

    pub(crate) fn mailbox(&self, name: &str) -> Result<Arc<Mailbox>> {
        self.hierarchy.read()?.get(name)
    }

    pub fn create_mailbox(&self, name: &str) -> Result<()> {
        self.hierarchy.write()?.create(name)?;
        Ok(())
    }

    pub fn delete_mailbox(&self, name: &str) -> Result<()> {
        let policy = self.shared.settings.delete_policy;
        self.hierarchy.write()?.delete(name, policy)
    }

    pub fn rename_mailbox(&self, existing: &str, new_name: &str) -> Result<()> {
        let policy = self.shared.settings.rename_policy;
        self.hierarchy.write()?.rename(existing, new_name, policy)
    }

    pub fn list_mailboxes(&self, subscribed_only: bool) -> Result<Vec<MailboxInfo>> {
        self.hierarchy.read()?.list(subscribed_only)
    }

    pub fn list_matching(&self, reference: &str, pattern: &str, subscribed_only: bool) -> Result<Vec<MailboxInfo>> {
        self.hierarchy.read()?.list_matching(reference, pattern, subscribed_only)
    }

    pub fn set_subscribed(&self, name: &str, subscribed: bool) -> Result<()> {
        debug!("{} '{}' for {}", if subscribed { "Subscribe" } else { "Unsubscribe" }, name, self.name);
        self.mailbox(name)?.set_subscribed(subscribed)
    }

    /// Full status of a mailbox without opening it.
    pub fn mailbox_status(&self, name: &str) -> Result<MailboxStatus> {
        let mbox = self.mailbox(name)?;
        let mut status = mbox.status()?;
        status.append_limit = self.effective_limit(Some(&*mbox))?;
        Ok(status)
    }

    pub fn status(&self, name: &str, items: &[StatusItem]) -> Result<Vec<(StatusItem, u32)>> {
        Ok(self.mailbox_status(name)?.select(items))
    }

    pub fn message_limit(&self) -> Result<Option<u32>> {
        Ok(*self.message_limit.read()?)
    }

    pub fn set_message_limit(&self, limit: Option<u32>) -> Result<()> {
        *self.message_limit.write()? = limit;
        Ok(())
    }

    /// Per-mailbox append limit; overrides the user and backend limits.
    pub fn set_mailbox_message_limit(&self, name: &str, limit: Option<u32>) -> Result<()> {
        self.mailbox(name)?.set_message_limit(limit)
    }

    /// The most specific append limit: mailbox, then user, then backend.
    pub fn effective_limit(&self, mbox: Option<&Mailbox>) -> Result<Option<u32>> {
        if let Some(limit) = mbox.map(Mailbox::message_limit).transpose()?.flatten() {
            return Ok(Some(limit));
        }
        if let Some(limit) = self.message_limit()? {
            return Ok(Some(limit));
        }
        self.shared.message_limit()
    }

    /// APPEND. When `via` is a view of the same mailbox, the new message is
    /// recent for that view; otherwise for the next view to look.
    pub fn create_message<I, S>(
        &self,
        name: &str,
        flags: I,
        date: DateTime<Utc>,
        content: &[u8],
        via: Option<&MailboxHandle>,
    ) -> Result<u32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mbox = self.mailbox(name)?;
        let limit = self.effective_limit(Some(&*mbox))?;
        let recent_to = match via {
            Some(handle) if handle.mailbox().is_ok_and(|m| Arc::ptr_eq(&m, &mbox)) => Some(handle.conn_id()),
            _ => None,
        };
        mbox.append(flag::storable(flags), date, content, limit, recent_to)
    }

    /// APPEND stamped with the current time.
    pub fn deliver<I, S>(&self, name: &str, flags: I, content: &[u8]) -> Result<u32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.create_message(name, flags, self.shared.clock.now(), content, None)
    }

    /// SELECT (`read_only == false`) or EXAMINE. Attaches `conn` as an
    /// observer until the returned handle is closed or dropped.
    pub fn get_mailbox(self: &Arc<Self>, name: &str, read_only: bool, conn: Arc<dyn Conn>) -> Result<(MailboxStatus, MailboxHandle)> {
        let mbox = self.mailbox(name)?;
        let id = mbox.attach(&conn)?;
        let handle = MailboxHandle::new(&mbox, self.clone(), id, read_only);
        let status = handle.status()?;
        info!(
            "{} opened '{}' as {} ({})",
            self.name,
            status.name,
            id,
            if read_only { "read-only" } else { "read-write" }
        );
        Ok((status, handle))
    }

    pub(crate) fn destroy(&self) -> Result<()> {
        self.hierarchy.write()?.clear()
    }
}
