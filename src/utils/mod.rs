//! Utility functions and helpers

pub mod logging;

pub use logging::{LogContext, init_logging};

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in seconds
///
/// A clock set before the epoch reads as zero.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
