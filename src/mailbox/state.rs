// src/mailbox/state.rs
//
// Shared state of one mailbox: the ordered message list, UID counters,
// flag vocabulary, per-session recent sets and the observer registry.
// Every structural mutation happens under the write half of one RwLock,
// which is also the ordering point for update delivery.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};
use crate::flag::{self, FlagSet};
use crate::message::Message;
use crate::seqset::{self, SeqSet};
use crate::store::{BlobId, MessageStore};
use crate::updates::{Broadcaster, Conn, ConnId, MailboxUpdate, Update};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusItem {
    Messages,
    Recent,
    UidNext,
    UidValidity,
    Unseen,
}

/// Counters and select data for one mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MailboxStatus {
    pub name: String,
    pub messages: u32,
    pub recent: u32,
    /// Number of messages without `\Seen`.
    pub unseen: u32,
    /// Sequence number of the first message without `\Seen`.
    pub unseen_seq_num: Option<u32>,
    pub uid_next: u32,
    pub uid_validity: u32,
    /// Flags in use; never contains `\*`.
    pub flags: Vec<String>,
    /// `flags` plus `\*`.
    pub permanent_flags: Vec<String>,
    pub read_only: bool,
    pub append_limit: Option<u32>,
}

impl MailboxStatus {
    pub fn get(&self, item: StatusItem) -> u32 {
        match item {
            StatusItem::Messages => self.messages,
            StatusItem::Recent => self.recent,
            StatusItem::UidNext => self.uid_next,
            StatusItem::UidValidity => self.uid_validity,
            StatusItem::Unseen => self.unseen,
        }
    }

    pub fn select(&self, items: &[StatusItem]) -> Vec<(StatusItem, u32)> {
        items.iter().map(|&item| (item, self.get(item))).collect()
    }
}

impl fmt::Display for StatusItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusItem::Messages => "MESSAGES",
            StatusItem::Recent => "RECENT",
            StatusItem::UidNext => "UIDNEXT",
            StatusItem::UidValidity => "UIDVALIDITY",
            StatusItem::Unseen => "UNSEEN",
        };
        f.write_str(s)
    }
}

/// A message about to be stored, before it has a UID.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub flags: FlagSet,
    pub internal_date: DateTime<Utc>,
    pub size: u32,
    pub blob: BlobId,
}

#[derive(Debug)]
pub struct MailboxState {
    pub name: String,
    pub uid_validity: u32,
    pub uid_next: u32,
    pub messages: Vec<Message>,
    pub subscribed: bool,
    pub message_limit: Option<u32>,
    /// Keywords ever stored in this mailbox.
    pub keywords: BTreeSet<String>,
    /// Recent messages not yet claimed by any session.
    pub pending_recent: BTreeSet<u32>,
    /// Recent UIDs owned by each attached session.
    pub sessions: BTreeMap<ConnId, BTreeSet<u32>>,
    pub broadcaster: Broadcaster,
}

impl MailboxState {
    fn new(name: &str, uid_validity: u32) -> Self {
        Self {
            name: name.to_string(),
            uid_validity,
            uid_next: 1,
            messages: Vec::new(),
            subscribed: false,
            message_limit: None,
            keywords: BTreeSet::new(),
            pending_recent: BTreeSet::new(),
            sessions: BTreeMap::new(),
            broadcaster: Broadcaster::new(),
        }
    }

    pub fn count(&self) -> u32 {
        self.messages.len() as u32
    }

    pub fn uids(&self) -> Vec<u32> {
        self.messages.iter().map(|m| m.uid).collect()
    }

    pub fn max_uid(&self) -> u32 {
        self.messages.last().map(|m| m.uid).unwrap_or(0)
    }

    /// Zero-based positions selected by `set`, ascending. Sequence numbers
    /// outside the mailbox are an error; unknown UIDs select nothing.
    pub fn resolve(&self, by_uid: bool, set: &SeqSet) -> Result<Vec<usize>> {
        if by_uid {
            Ok(seqset::resolve_uids(set, &self.uids()))
        } else {
            seqset::resolve_seq_nums(set, self.count())
        }
    }

    pub fn position_of(&self, uid: u32) -> Option<usize> {
        self.messages.binary_search_by_key(&uid, |m| m.uid).ok()
    }

    pub fn is_recent_for(&self, conn: Option<ConnId>, uid: u32) -> bool {
        conn.and_then(|id| self.sessions.get(&id))
            .map(|recent| recent.contains(&uid))
            .unwrap_or(false)
    }

    /// Hands every unclaimed recent message to `conn`.
    pub fn claim_recent(&mut self, conn: ConnId) {
        if self.pending_recent.is_empty() {
            return;
        }
        if let Some(recent) = self.sessions.get_mut(&conn) {
            debug!(
                "{} claims {} recent message(s) in '{}'",
                conn,
                self.pending_recent.len(),
                self.name
            );
            recent.append(&mut self.pending_recent);
        }
    }

    pub fn recent_count(&self) -> u32 {
        let claimed: BTreeSet<u32> = self.sessions.values().flatten().copied().collect();
        (claimed.len() + self.pending_recent.len()) as u32
    }

    pub fn flag_vocabulary(&self) -> Vec<String> {
        let mut flags: Vec<String> = flag::SYSTEM_FLAGS.iter().map(|f| f.to_string()).collect();
        flags.extend(self.keywords.iter().cloned());
        flags
    }

    pub fn status(&self) -> MailboxStatus {
        let flags = self.flag_vocabulary();
        let mut permanent_flags = flags.clone();
        permanent_flags.push(flag::WILDCARD.to_string());

        let unseen_seq_num = self
            .messages
            .iter()
            .position(|m| !m.has_flag(flag::SEEN))
            .map(|ix| ix as u32 + 1);

        MailboxStatus {
            name: self.name.clone(),
            messages: self.count(),
            recent: self.recent_count(),
            unseen: self.messages.iter().filter(|m| !m.has_flag(flag::SEEN)).count() as u32,
            unseen_seq_num,
            uid_next: self.uid_next,
            uid_validity: self.uid_validity,
            flags,
            permanent_flags,
            read_only: false,
            append_limit: self.message_limit,
        }
    }

    pub fn learn_keywords(&mut self, flags: &FlagSet) {
        for f in flags {
            if !flag::SYSTEM_FLAGS.contains(&f.as_str()) {
                self.keywords.insert(f.clone());
            }
        }
    }

    /// Appends with the next UID. Recent goes to `recent_to` when that
    /// session is attached, otherwise it waits to be claimed.
    pub fn push(&mut self, new: NewMessage, recent_to: Option<ConnId>) -> u32 {
        let uid = self.uid_next;
        self.uid_next += 1;
        self.learn_keywords(&new.flags);
        self.messages.push(Message {
            uid,
            internal_date: new.internal_date,
            flags: new.flags,
            size: new.size,
            blob: new.blob,
        });

        match recent_to.and_then(|id| self.sessions.get_mut(&id)) {
            Some(recent) => {
                recent.insert(uid);
            }
            None => {
                self.pending_recent.insert(uid);
            }
        }
        uid
    }

    /// Removes the message at `ix`, forgetting it in every recent set.
    pub fn remove_at(&mut self, ix: usize) -> Message {
        let msg = self.messages.remove(ix);
        self.pending_recent.remove(&msg.uid);
        for recent in self.sessions.values_mut() {
            recent.remove(&msg.uid);
        }
        msg
    }

    /// Appends copies in one step; observers get a single MailboxUpdate.
    pub fn push_copies(&mut self, copies: Vec<NewMessage>, recent_to: Option<ConnId>) -> Vec<u32> {
        let uids: Vec<u32> = copies
            .into_iter()
            .map(|copy| self.push(copy, recent_to))
            .collect();
        if !uids.is_empty() {
            info!("Copied {} message(s) into '{}'", uids.len(), self.name);
            self.publish_status();
        }
        uids
    }

    pub fn publish_status(&mut self) {
        let update = Update::Mailbox(MailboxUpdate {
            mailbox: self.name.clone(),
            status: self.status(),
        });
        self.broadcaster.publish(update, None);
    }
}

/// One mailbox. Users share it through `Arc`; views hold it weakly.
pub struct Mailbox {
    state: RwLock<MailboxState>,
    store: Arc<dyn MessageStore>,
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox").field("state", &self.state).finish()
    }
}

impl Mailbox {
    pub fn new(name: &str, uid_validity: u32, store: Arc<dyn MessageStore>) -> Self {
        debug!("New mailbox '{}' (uidvalidity {})", name, uid_validity);
        Self {
            state: RwLock::new(MailboxState::new(name, uid_validity)),
            store,
        }
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, MailboxState>> {
        Ok(self.state.read()?)
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, MailboxState>> {
        Ok(self.state.write()?)
    }

    /// Write-locks two distinct mailboxes, always in address order, so
    /// concurrent moves in opposite directions cannot deadlock. Guards are
    /// returned in argument order.
    pub(crate) fn write_pair<'a>(
        first: &'a Mailbox,
        second: &'a Mailbox,
    ) -> Result<(RwLockWriteGuard<'a, MailboxState>, RwLockWriteGuard<'a, MailboxState>)> {
        if std::ptr::eq(first, second) {
            return Err(Error::InvalidArgument("cannot lock a mailbox twice".to_string()));
        }
        if (first as *const Mailbox) < (second as *const Mailbox) {
            let a = first.write()?;
            let b = second.write()?;
            Ok((a, b))
        } else {
            let b = second.write()?;
            let a = first.write()?;
            Ok((a, b))
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn name(&self) -> Result<String> {
        Ok(self.read()?.name.clone())
    }

    pub fn status(&self) -> Result<MailboxStatus> {
        Ok(self.read()?.status())
    }

    pub fn uid_validity(&self) -> Result<u32> {
        Ok(self.read()?.uid_validity)
    }

    pub fn is_subscribed(&self) -> Result<bool> {
        Ok(self.read()?.subscribed)
    }

    pub fn set_subscribed(&self, subscribed: bool) -> Result<()> {
        self.write()?.subscribed = subscribed;
        Ok(())
    }

    pub fn message_limit(&self) -> Result<Option<u32>> {
        Ok(self.read()?.message_limit)
    }

    pub fn set_message_limit(&self, limit: Option<u32>) -> Result<()> {
        self.write()?.message_limit = limit;
        Ok(())
    }

    pub(crate) fn attach(&self, conn: &Arc<dyn Conn>) -> Result<ConnId> {
        let mut state = self.write()?;
        let id = state.broadcaster.attach(conn);
        state.sessions.insert(id, BTreeSet::new());
        state.claim_recent(id);
        Ok(id)
    }

    pub(crate) fn detach(&self, id: ConnId) -> Result<()> {
        let mut state = self.write()?;
        state.broadcaster.detach(id);
        state.sessions.remove(&id);
        Ok(())
    }

    /// Stores content and appends it; one MailboxUpdate goes to every
    /// observer. `limit` is the effective append limit for this mailbox.
    pub(crate) fn append(
        &self,
        flags: FlagSet,
        date: DateTime<Utc>,
        content: &[u8],
        limit: Option<u32>,
        recent_to: Option<ConnId>,
    ) -> Result<u32> {
        let size = check_limit(content.len(), limit)?;
        let blob = self.store.save(content)?;

        let mut state = match self.write() {
            Ok(state) => state,
            Err(e) => {
                if let Err(e) = self.store.remove(blob) {
                    warn!("Failed to release unappended content: {}", e);
                }
                return Err(e);
            }
        };
        let uid = state.push(
            NewMessage {
                flags,
                internal_date: date,
                size,
                blob,
            },
            recent_to,
        );
        info!("Appended UID {} to '{}' ({} bytes)", uid, state.name, size);
        state.publish_status();
        Ok(uid)
    }

    /// Appends already-stored copies in one step with a single MailboxUpdate.
    /// Every copy is recent.
    pub(crate) fn append_copies(&self, copies: Vec<NewMessage>, recent_to: Option<ConnId>) -> Result<Vec<u32>> {
        Ok(self.write()?.push_copies(copies, recent_to))
    }

    /// Renames in place, keeping or resetting the UID epoch.
    pub(crate) fn rename(&self, new_name: &str, reset_validity: Option<u32>) -> Result<()> {
        let mut state = self.write()?;
        debug!("Renaming mailbox '{}' -> '{}'", state.name, new_name);
        state.name = new_name.to_string();

        if let Some(validity) = reset_validity {
            let mut renumbered = BTreeMap::new();
            for (ix, msg) in state.messages.iter_mut().enumerate() {
                let uid = ix as u32 + 1;
                renumbered.insert(msg.uid, uid);
                msg.uid = uid;
            }
            let remap = |set: &mut BTreeSet<u32>| {
                *set = set.iter().filter_map(|u| renumbered.get(u).copied()).collect();
            };
            remap(&mut state.pending_recent);
            for recent in state.sessions.values_mut() {
                remap(recent);
            }
            state.uid_next = state.count() + 1;
            state.uid_validity = validity;
            info!(
                "Mailbox '{}' renumbered under uidvalidity {}",
                new_name, validity
            );
        }
        Ok(())
    }

    /// Moves every message out of this mailbox into a fresh one with no
    /// expunge events; blobs are handed over, not copied.
    pub(crate) fn drain_into(&self, target: &Mailbox) -> Result<()> {
        let mut src = self.write()?;
        let mut dst = target.write()?;
        let moved: Vec<Message> = std::mem::take(&mut src.messages);
        src.pending_recent.clear();
        for recent in src.sessions.values_mut() {
            recent.clear();
        }
        dst.subscribed = src.subscribed;
        dst.message_limit = src.message_limit;
        for msg in moved {
            dst.push(
                NewMessage {
                    flags: msg.flags,
                    internal_date: msg.internal_date,
                    size: msg.size,
                    blob: msg.blob,
                },
                None,
            );
        }
        src.publish_status();
        Ok(())
    }

    /// Drops all content and observers; the mailbox is unusable afterwards.
    pub(crate) fn destroy(&self) -> Result<()> {
        let mut state = self.write()?;
        for msg in state.messages.drain(..) {
            if let Err(e) = self.store.remove(msg.blob) {
                warn!("Failed to remove content of UID {}: {}", msg.uid, e);
            }
        }
        state.pending_recent.clear();
        state.sessions.clear();
        for id in state.broadcaster.ids() {
            state.broadcaster.detach(id);
        }
        info!("Destroyed mailbox '{}'", state.name);
        Ok(())
    }
}

pub(crate) fn check_limit(len: usize, limit: Option<u32>) -> Result<u32> {
    let size = u32::try_from(len).map_err(|_| Error::TooBig {
        size: u32::MAX,
        limit: limit.unwrap_or(u32::MAX),
    })?;
    match limit {
        Some(limit) if size > limit => Err(Error::TooBig { size, limit }),
        _ => Ok(size),
    }
}
