//! Timed holds between servo commands.

use std::thread;
use std::time::Duration;

/// Blocks the current thread for a fixed duration.
///
/// Motion sequences only ever suspend through this trait, which lets tests
/// record the requested holds instead of actually waiting for them.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn thread_sleeper_waits_at_least_the_duration() {
        let start = Instant::now();
        ThreadSleeper.sleep(Duration::from_millis(15));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
