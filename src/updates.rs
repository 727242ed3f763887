// src/updates.rs
//
// Update events and the per-mailbox observer registry that fans them out.

use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::Result;
use crate::mailbox::MailboxStatus;

/// Aggregate counts after a structural change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxUpdate {
    pub mailbox: String,
    pub status: MailboxStatus,
}

/// Flags changed on one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageUpdate {
    pub mailbox: String,
    pub seq_num: u32,
    pub uid: u32,
    /// Flags as seen by the receiving observer (`\Recent` included if it is
    /// recent for that observer).
    pub flags: Vec<String>,
}

/// One message removed; `seq_num` is its number at the moment of removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpungeUpdate {
    pub mailbox: String,
    pub seq_num: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Mailbox(MailboxUpdate),
    Message(MessageUpdate),
    Expunge(ExpungeUpdate),
}

impl Update {
    pub fn mailbox(&self) -> &str {
        match self {
            Update::Mailbox(u) => &u.mailbox,
            Update::Message(u) => &u.mailbox,
            Update::Expunge(u) => &u.mailbox,
        }
    }
}

/// Sink supplied by the protocol layer for one connection.
///
/// Called while the mailbox that produced the update is locked, so an
/// implementation must not call back into that mailbox synchronously.
pub trait Conn: Send + Sync {
    fn send_update(&self, update: Update) -> Result<()>;
}

/// Observer identity, threaded through mutating calls so a silent operation
/// can exclude its own connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Observers attached to one mailbox. Holds connections weakly.
#[derive(Default)]
pub struct Broadcaster {
    next_id: u64,
    observers: BTreeMap<ConnId, Weak<dyn Conn>>,
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("observers", &self.observers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, conn: &Arc<dyn Conn>) -> ConnId {
        let id = ConnId(self.next_id);
        self.next_id += 1;
        self.observers.insert(id, Arc::downgrade(conn));
        debug!("Attached observer {}", id);
        id
    }

    pub fn detach(&mut self, id: ConnId) -> bool {
        let removed = self.observers.remove(&id).is_some();
        if removed {
            debug!("Detached observer {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn ids(&self) -> Vec<ConnId> {
        self.observers.keys().copied().collect()
    }

    /// Delivers the same update to every observer except `exclude`.
    pub fn publish(&mut self, update: Update, exclude: Option<ConnId>) {
        self.publish_with(exclude, |_| Some(update.clone()));
    }

    /// Delivers a per-observer update; `render` returning None skips that
    /// observer. Dropped connections are pruned; delivery failures are logged.
    pub fn publish_with<F>(&mut self, exclude: Option<ConnId>, mut render: F)
    where
        F: FnMut(ConnId) -> Option<Update>,
    {
        let mut dead = Vec::new();
        for (&id, weak) in &self.observers {
            if Some(id) == exclude {
                continue;
            }
            let Some(conn) = weak.upgrade() else {
                dead.push(id);
                continue;
            };
            let Some(update) = render(id) else {
                continue;
            };
            if let Err(e) = conn.send_update(update) {
                warn!("Failed to deliver update to {}: {}", id, e);
            }
        }
        for id in dead {
            debug!("Pruning dropped observer {}", id);
            self.observers.remove(&id);
        }
    }
}
