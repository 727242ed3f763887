// tests/harness/mod.rs
//
// Integration testing harness for imap-mailstore.
// Provides update-recording connections, time control and message fixtures.

pub mod collector;
pub mod fixtures;
pub mod test_harness;
pub mod virtual_clock;

pub use collector::CollectorConn;
pub use fixtures::{base_date, create_msgs, ENCODED_TEST_MSG, TEST_MAIL, TEST_MSG};
pub use test_harness::{TestHarness, USERNAME};
pub use virtual_clock::VirtualClock;
