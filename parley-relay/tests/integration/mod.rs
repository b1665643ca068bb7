//! Integration tests for parley-relay.
//!
//! - `pairing_tests` - join, forwarding and buffering between sessions
//! - `server_tests` - the axum router


use tracing::Level;

/// Initialize tracing for tests (call once per test).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}
