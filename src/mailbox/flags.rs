// src/mailbox/flags.rs
//
// STORE: applies a flag operation to a resolved selection and tells the
// observers about every message that changed.

use log::debug;

use crate::error::Result;
use crate::flag::{self, FlagOp, FlagSet};
use crate::mailbox::state::MailboxState;
use crate::seqset::SeqSet;
use crate::updates::{ConnId, MessageUpdate, Update};

impl MailboxState {
    /// Applies `op` with `values` to the selected messages.
    ///
    /// Resolution happens before anything changes, so an out-of-range
    /// sequence number leaves every message untouched. Each changed message
    /// yields one MessageUpdate per observer, carrying that observer's view
    /// of `\Recent`; `silent` withholds it from `issuer`. Returns the number
    /// of messages changed.
    pub fn update_flags(
        &mut self,
        by_uid: bool,
        set: &SeqSet,
        op: FlagOp,
        values: &FlagSet,
        issuer: Option<ConnId>,
        silent: bool,
    ) -> Result<usize> {
        let positions = self.resolve(by_uid, set)?;
        self.learn_keywords(values);

        let mut changed = Vec::new();
        for ix in positions {
            if flag::apply(&mut self.messages[ix].flags, op, values) {
                changed.push(ix);
            }
        }
        debug!(
            "{} {:?} on '{}': {} message(s) changed",
            op,
            values,
            self.name,
            changed.len()
        );

        let exclude = if silent { issuer } else { None };
        for &ix in &changed {
            self.notify_flags(ix, exclude);
        }
        Ok(changed.len())
    }

    /// Sends the current flags of the message at `ix` to every observer
    /// except `exclude`.
    pub fn notify_flags(&mut self, ix: usize, exclude: Option<ConnId>) {
        let msg = &self.messages[ix];
        let (uid, stored) = (msg.uid, msg.flags.clone());
        let seq_num = ix as u32 + 1;
        let name = self.name.clone();
        let sessions = &self.sessions;

        self.broadcaster.publish_with(exclude, |id| {
            let recent = sessions.get(&id).is_some_and(|r| r.contains(&uid));
            Some(Update::Message(MessageUpdate {
                mailbox: name.clone(),
                seq_num,
                uid,
                flags: flag::with_recent(&stored, recent),
            }))
        });
    }
}
