// src/mailbox/mod.rs
//
// One mailbox: shared state, the STORE and EXPUNGE engines, and the
// per-connection view.

pub mod expunge;
pub mod flags;
pub mod handle;
pub mod state;

pub use handle::MailboxHandle;
pub use state::{Mailbox, MailboxStatus, NewMessage, StatusItem};
