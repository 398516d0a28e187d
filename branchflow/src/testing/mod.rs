//! Testing utilities for branchflow stage trees.
//!
//! This module provides:
//! - Small typed handlers for building trees in tests
//! - A shared call log for observing handler activity
//! - Test tracing setup and log capture

mod mocks;

pub use mocks::{CallLog, Failing, Increment, Parity, Recorder, Sink, ToText};

use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`, defaulting to `branchflow=debug`. Safe to call from
/// every test; only the first call installs a subscriber.
pub fn init_test_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("branchflow=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Default)]
struct LogBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a thread-local subscriber and returns its result together
/// with everything branchflow logged at `debug` or above, without ANSI colors.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("branchflow=debug"))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.bytes.lock()).into_owned();
    (result, logs)
}
