// tests/harness/test_harness.rs
//
// High-level test harness combining all components.
// Provides a convenient API for writing integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use imap_mailstore::{Backend, Conn, MailboxHandle, MemoryStore, Settings, User};

use crate::harness::collector::CollectorConn;
use crate::harness::virtual_clock::VirtualClock;

pub const USERNAME: &str = "username1";

/// A memory backend on a virtual clock with one user that owns an INBOX.
pub struct TestHarness {
    pub backend: Backend,
    pub clock: VirtualClock,
    pub store: Arc<MemoryStore>,
    pub user: Arc<User>,
    next_mbox: AtomicU32,
}

impl TestHarness {
    /// Create a new test harness with default settings.
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let clock = VirtualClock::at(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap());
        let store = Arc::new(MemoryStore::new());
        let backend = Backend::new(settings, store.clone(), Arc::new(clock.clone()));
        let user = backend.create_user(USERNAME).unwrap();
        user.create_mailbox("INBOX").unwrap();
        Self {
            backend,
            clock,
            store,
            user,
            next_mbox: AtomicU32::new(1),
        }
    }

    /// Opens `name` read-write with a fresh recording connection. Keep the
    /// connection alive for as long as its updates matter.
    pub fn open(&self, name: &str) -> (Arc<CollectorConn>, MailboxHandle) {
        self.open_with(name, false)
    }

    pub fn examine(&self, name: &str) -> (Arc<CollectorConn>, MailboxHandle) {
        self.open_with(name, true)
    }

    fn open_with(&self, name: &str, read_only: bool) -> (Arc<CollectorConn>, MailboxHandle) {
        let conn = CollectorConn::new();
        let (_, handle) = self
            .user
            .get_mailbox(name, read_only, conn.clone() as Arc<dyn Conn>)
            .unwrap();
        (conn, handle)
    }

    /// Creates a uniquely named empty mailbox and opens it.
    pub fn get_mbox(&self) -> (String, Arc<CollectorConn>, MailboxHandle) {
        let name = format!("test{}", self.next_mbox.fetch_add(1, Ordering::SeqCst));
        self.user.create_mailbox(&name).unwrap();
        let (conn, handle) = self.open(&name);
        (name, conn, handle)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
