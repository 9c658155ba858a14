//! Shared helpers for integration tests.

use std::time::{Duration, Instant};

/// Poll `condition` until it holds or `timeout` elapses.
///
/// Used for positive assertions about concurrent progress; negative
/// assertions (something must NOT happen) use short fixed sleeps instead.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Generous bound for operations that should complete almost immediately.
pub const PROGRESS_TIMEOUT: Duration = Duration::from_secs(5);
