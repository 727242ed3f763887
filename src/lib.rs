// src/lib.rs
//
// Library entry point for imap-mailstore.
// Re-exports the types a protocol layer needs to drive the engine.

pub mod backend;
pub mod cfg;
pub mod clock;
pub mod error;
pub mod fetch;
pub mod flag;
pub mod hierarchy;
pub mod mailbox;
pub mod message;
pub mod search;
pub mod seqset;
pub mod store;
pub mod updates;
pub mod user;
pub mod utils;

pub use backend::{Backend, Settings};
pub use clock::{Clock, RealClock};
pub use error::{Error, Result};
pub use fetch::{BodySectionName, FetchItem, FetchedMessage};
pub use flag::FlagOp;
pub use hierarchy::MailboxInfo;
pub use mailbox::{MailboxHandle, MailboxStatus, StatusItem};
pub use search::SearchCriteria;
pub use seqset::SeqSet;
pub use store::{FsStore, MemoryStore, MessageStore};
pub use updates::{Conn, ConnId, ExpungeUpdate, MailboxUpdate, MessageUpdate, Update};
pub use user::User;
