// src/mailbox/handle.rs
//
// A connection's view of one mailbox. Holds the mailbox weakly: once the
// mailbox is deleted every call reports NoSuchMailbox.

use log::{debug, info, warn};
use std::sync::{Arc, Weak};

use crate::error::{Error, Result};
use crate::fetch::{fetch_message, FetchItem, FetchedMessage};
use crate::flag::{self, FlagOp};
use crate::mailbox::state::{check_limit, Mailbox, MailboxState, MailboxStatus, NewMessage};
use crate::message::{Message, MessageContent};
use crate::search::{SearchContext, SearchCriteria};
use crate::seqset::SeqSet;
use crate::updates::ConnId;
use crate::user::User;

pub struct MailboxHandle {
    mailbox: Weak<Mailbox>,
    user: Arc<User>,
    conn: ConnId,
    read_only: bool,
}

impl std::fmt::Debug for MailboxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxHandle")
            .field("user", &self.user.username())
            .field("conn", &self.conn)
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl MailboxHandle {
    pub(crate) fn new(mailbox: &Arc<Mailbox>, user: Arc<User>, conn: ConnId, read_only: bool) -> Self {
        Self {
            mailbox: Arc::downgrade(mailbox),
            user,
            conn,
            read_only,
        }
    }

    pub(crate) fn mailbox(&self) -> Result<Arc<Mailbox>> {
        self.mailbox.upgrade().ok_or(Error::NoSuchMailbox)
    }

    fn writable(&self) -> Result<Arc<Mailbox>> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        self.mailbox()
    }

    pub fn name(&self) -> Result<String> {
        self.mailbox()?.name()
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn status(&self) -> Result<MailboxStatus> {
        let mbox = self.mailbox()?;
        let mut status = mbox.status()?;
        status.read_only = self.read_only;
        status.append_limit = self.user.effective_limit(Some(&*mbox))?;
        Ok(status)
    }

    /// Brings this view up to date: claims newly arrived recent messages.
    /// Updates are pushed as they happen, so nothing is replayed here.
    pub fn poll(&self) -> Result<MailboxStatus> {
        {
            let mbox = self.mailbox()?;
            mbox.write()?.claim_recent(self.conn);
        }
        self.status()
    }

    /// FETCH. Results are in ascending sequence order whatever the order
    /// of `set`. A non-peek body section on a writable view sets `\Seen`.
    pub fn list_messages(&self, by_uid: bool, set: &SeqSet, items: &[FetchItem]) -> Result<Vec<FetchedMessage>> {
        let mbox = self.mailbox()?;
        let mut state = mbox.write()?;
        state.claim_recent(self.conn);
        let positions = state.resolve(by_uid, set)?;

        let mut items = items.to_vec();
        if by_uid && !items.contains(&FetchItem::Uid) {
            items.push(FetchItem::Uid);
        }
        let sets_seen = !self.read_only && items.iter().any(FetchItem::sets_seen);
        if sets_seen && !items.contains(&FetchItem::Flags) {
            items.push(FetchItem::Flags);
        }
        let needs_content = items.iter().any(FetchItem::needs_content);

        let mut out = Vec::with_capacity(positions.len());
        for &ix in &positions {
            let msg = &state.messages[ix];
            let raw = if needs_content {
                Some(mbox.store().load(msg.blob)?)
            } else {
                None
            };
            let recent = state.is_recent_for(Some(self.conn), msg.uid);
            out.push(fetch_message(
                msg,
                ix as u32 + 1,
                recent,
                raw.as_deref().map(Vec::as_slice),
                &items,
            )?);
        }

        if sets_seen {
            for (fetched, &ix) in out.iter_mut().zip(&positions) {
                if state.messages[ix].has_flag(flag::SEEN) {
                    continue;
                }
                state.messages[ix].flags.insert(flag::SEEN.to_string());
                state.notify_flags(ix, Some(self.conn));
                let uid = state.messages[ix].uid;
                fetched.flags = Some(flag::with_recent(
                    &state.messages[ix].flags,
                    state.is_recent_for(Some(self.conn), uid),
                ));
            }
        }
        debug!("Fetched {} message(s) from '{}'", out.len(), state.name);
        Ok(out)
    }

    /// SEARCH. Returns ascending sequence numbers, or UIDs when `by_uid`.
    pub fn search_messages(&self, by_uid: bool, criteria: &SearchCriteria) -> Result<Vec<u32>> {
        let mbox = self.mailbox()?;
        let mut state = mbox.write()?;
        state.claim_recent(self.conn);

        let count = state.count();
        let max_uid = state.max_uid();
        let needs_content = criteria.needs_content();

        let mut hits = Vec::new();
        for (ix, msg) in state.messages.iter().enumerate() {
            let content = if needs_content {
                let raw = mbox.store().load(msg.blob)?;
                Some(MessageContent::parse(&raw)?)
            } else {
                None
            };
            let ctx = SearchContext {
                msg,
                seq_num: ix as u32 + 1,
                count,
                max_uid,
                recent: state.is_recent_for(Some(self.conn), msg.uid),
                content: content.as_ref(),
            };
            if criteria.matches(&ctx) {
                hits.push(if by_uid { msg.uid } else { ix as u32 + 1 });
            }
        }
        debug!("Search in '{}' matched {} of {}", state.name, hits.len(), count);
        Ok(hits)
    }

    /// STORE. With `silent`, this view gets no MessageUpdate for the change.
    pub fn update_messages_flags<I, S>(&self, by_uid: bool, set: &SeqSet, op: FlagOp, silent: bool, flags: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mbox = self.writable()?;
        let values = flag::storable(flags);
        let mut state = mbox.write()?;
        state.claim_recent(self.conn);
        state.update_flags(by_uid, set, op, &values, Some(self.conn), silent)?;
        Ok(())
    }

    pub fn expunge(&self) -> Result<()> {
        let mbox = self.writable()?;
        let mut state = mbox.write()?;
        state.claim_recent(self.conn);
        state.expunge(mbox.store().as_ref());
        Ok(())
    }

    /// COPY. Returns the UIDs assigned in the destination.
    pub fn copy_messages(&self, by_uid: bool, set: &SeqSet, dest: &str) -> Result<Vec<u32>> {
        let src = self.mailbox()?;
        let dst = self.user.mailbox(dest)?;
        let limit = self.user.effective_limit(Some(&*dst))?;

        let selected: Vec<Message> = {
            let state = src.read()?;
            let positions = state.resolve(by_uid, set)?;
            positions.into_iter().map(|ix| state.messages[ix].clone()).collect()
        };
        let copies = duplicate(&src, &dst, &selected, limit)?;

        let recent_to = if Arc::ptr_eq(&src, &dst) { Some(self.conn) } else { None };
        dst.append_copies(copies, recent_to)
    }

    /// MOVE: copy, then expunge the originals, with both mailboxes locked
    /// throughout. The source observers see only ExpungeUpdates; the
    /// destination sees one MailboxUpdate.
    pub fn move_messages(&self, by_uid: bool, set: &SeqSet, dest: &str) -> Result<Vec<u32>> {
        let src = self.writable()?;
        let dst = self.user.mailbox(dest)?;
        let limit = self.user.effective_limit(Some(&*dst))?;

        if Arc::ptr_eq(&src, &dst) {
            let mut state = src.write()?;
            state.claim_recent(self.conn);
            let (uids, copies) = stage_move(&state, &src, &dst, by_uid, set, limit)?;
            let moved = state.push_copies(copies, Some(self.conn));
            state.expunge_uids(src.store().as_ref(), &uids);
            return Ok(moved);
        }

        let (mut src_state, mut dst_state) = Mailbox::write_pair(&src, &dst)?;
        src_state.claim_recent(self.conn);
        let (uids, copies) = stage_move(&src_state, &src, &dst, by_uid, set, limit)?;
        let moved = dst_state.push_copies(copies, None);
        let removed = src_state.expunge_uids(src.store().as_ref(), &uids);
        info!(
            "Moved {} message(s) from '{}' to '{}'",
            removed.len(),
            src_state.name,
            dst_state.name
        );
        Ok(moved)
    }

    /// Detaches from the mailbox. Dropping the handle does the same.
    pub fn close(self) {}
}

/// Resolves a move selection against a locked source and duplicates its
/// content. Returns the source UIDs (ascending) and the staged copies.
fn stage_move(
    state: &MailboxState,
    src: &Mailbox,
    dst: &Mailbox,
    by_uid: bool,
    set: &SeqSet,
    limit: Option<u32>,
) -> Result<(Vec<u32>, Vec<NewMessage>)> {
    let selected: Vec<Message> = state
        .resolve(by_uid, set)?
        .into_iter()
        .map(|ix| state.messages[ix].clone())
        .collect();
    let copies = duplicate(src, dst, &selected, limit)?;
    Ok((selected.iter().map(|m| m.uid).collect(), copies))
}

/// Stores a copy of each message's content in `dst`. Nothing is kept if
/// any message is over `limit` or any copy fails.
fn duplicate(src: &Mailbox, dst: &Mailbox, selected: &[Message], limit: Option<u32>) -> Result<Vec<NewMessage>> {
    for msg in selected {
        check_limit(msg.size as usize, limit)?;
    }

    let mut copies = Vec::with_capacity(selected.len());
    for msg in selected {
        let saved = src
            .store()
            .load(msg.blob)
            .and_then(|raw| dst.store().save(&raw));
        match saved {
            Ok(blob) => copies.push(NewMessage {
                flags: msg.flags.clone(),
                internal_date: msg.internal_date,
                size: msg.size,
                blob,
            }),
            Err(e) => {
                for copy in &copies {
                    if let Err(e) = dst.store().remove(copy.blob) {
                        warn!("Failed to release partial copy: {}", e);
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(copies)
}

impl Drop for MailboxHandle {
    fn drop(&mut self) {
        if let Some(mbox) = self.mailbox.upgrade() {
            if let Err(e) = mbox.detach(self.conn) {
                warn!("Failed to detach {}: {}", self.conn, e);
            }
        }
    }
}
