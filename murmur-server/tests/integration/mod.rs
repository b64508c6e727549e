//! Integration tests for murmur_server.
//!
//! - `connection_tests` - binding, supersession and disconnect cleanup
//! - `presence_tests` - join/leave and presence broadcasts
//! - `relay_tests` - addressed envelope forwarding


use murmur_server::{Coordinator, CoordinatorHandle};
use tracing::Level;

/// Initialize tracing for tests (call once per test).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn create_test_coordinator() -> CoordinatorHandle {
    Coordinator::spawn(64)
}
