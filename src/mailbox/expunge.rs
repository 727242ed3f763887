// src/mailbox/expunge.rs
//
// EXPUNGE: removes messages and reports each removal with the sequence
// number the message had at that moment.

use log::{info, warn};

use crate::flag;
use crate::mailbox::state::MailboxState;
use crate::store::MessageStore;
use crate::updates::{ExpungeUpdate, Update};

impl MailboxState {
    /// Removes every `\Deleted` message. Returns the UIDs removed.
    pub fn expunge(&mut self, store: &dyn MessageStore) -> Vec<u32> {
        self.expunge_where(store, |msg| msg.has_flag(flag::DELETED))
    }

    /// Removes the given UIDs regardless of flags (the tail of a move).
    pub fn expunge_uids(&mut self, store: &dyn MessageStore, uids: &[u32]) -> Vec<u32> {
        self.expunge_where(store, |msg| uids.binary_search(&msg.uid).is_ok())
    }

    /// Walks the list once in ascending order. The k-th removal (0-based)
    /// of a message originally at position p is announced as p + 1 - k,
    /// so replaying the events against a shrinking array reproduces the
    /// surviving list. UIDs and uid_next are untouched.
    fn expunge_where<F>(&mut self, store: &dyn MessageStore, doomed: F) -> Vec<u32>
    where
        F: Fn(&crate::message::Message) -> bool,
    {
        let targets: Vec<usize> = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| doomed(m))
            .map(|(ix, _)| ix)
            .collect();

        let mut removed = Vec::with_capacity(targets.len());
        for (k, ix) in targets.into_iter().enumerate() {
            let current = ix - k;
            let msg = self.remove_at(current);
            if let Err(e) = store.remove(msg.blob) {
                warn!("Failed to remove content of UID {}: {}", msg.uid, e);
            }
            removed.push(msg.uid);

            let update = Update::Expunge(ExpungeUpdate {
                mailbox: self.name.clone(),
                seq_num: current as u32 + 1,
            });
            self.broadcaster.publish(update, None);
        }

        if !removed.is_empty() {
            info!("Expunged {} message(s) from '{}'", removed.len(), self.name);
        }
        removed
    }
}
