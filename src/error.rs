// src/error.rs
//
// Error taxonomy for the mailbox engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Mailbox (or copy/move destination) does not exist.
    #[error("No such mailbox")]
    NoSuchMailbox,

    #[error("Mailbox already exists")]
    MailboxExists,

    #[error("imap: user already exists")]
    UserExists,

    #[error("imap: user doesn't exists")]
    NoSuchUser,

    /// Sequence-number addressing referenced a position past the live count.
    #[error("Sequence number {seq} out of range (mailbox has {count} messages)")]
    OutOfRange { seq: u32, count: u32 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Mailbox is opened read-only")]
    ReadOnly,

    #[error("Message size {size} exceeds append limit {limit}")]
    TooBig { size: u32, limit: u32 },

    #[error("Message store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message parse error: {0}")]
    Parse(#[from] mailparse::MailParseError),

    #[error("Internal lock poisoned")]
    Poisoned,
}

impl Error {
    /// True for errors a caller may answer by trying another destination.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NoSuchMailbox | Error::NoSuchUser)
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::Poisoned
    }
}

pub type Result<T> = std::result::Result<T, Error>;
