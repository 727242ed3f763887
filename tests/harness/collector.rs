// tests/harness/collector.rs
//
// A connection that records every update pushed to it, so tests can assert
// on exactly what an observer was told.

use std::sync::{Arc, RwLock};

use imap_mailstore::{Conn, ExpungeUpdate, MailboxUpdate, MessageUpdate, Update};

#[derive(Clone, Default)]
pub struct CollectorConn {
    updates: Arc<RwLock<Vec<Update>>>,
}

impl CollectorConn {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All updates received so far, oldest first.
    pub fn updates(&self) -> Vec<Update> {
        self.updates.read().unwrap().clone()
    }

    /// Returns and forgets the recorded updates.
    pub fn take(&self) -> Vec<Update> {
        std::mem::take(&mut *self.updates.write().unwrap())
    }

    pub fn clear(&self) {
        self.updates.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.updates.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mailbox_updates(&self) -> Vec<MailboxUpdate> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                Update::Mailbox(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn message_updates(&self) -> Vec<MessageUpdate> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                Update::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn expunge_updates(&self) -> Vec<ExpungeUpdate> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                Update::Expunge(e) => Some(e),
                _ => None,
            })
            .collect()
    }
}

impl Conn for CollectorConn {
    fn send_update(&self, update: Update) -> imap_mailstore::Result<()> {
        self.updates.write()?.push(update);
        Ok(())
    }
}
