//! A time interface that can be replaced by a fake time implementation
//! during testing.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

//------------ Clock -----------------------------------------------------------

/// A source for the current time.
///
/// The resolver reads the time through this trait whenever it sends a
/// query, checks for retransmissions, or looks at the age of a cached
/// record.
pub trait Clock: Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Instant;
}

//------------ SystemClock -----------------------------------------------------

/// Implementation of the [Clock] trait using the Instant type from
/// std::time.
#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

//------------ FakeClock -----------------------------------------------------

/// Implementation of the [Clock] trait to fake the passing of time, for
/// example for testing.
///
/// Clones share the same time.
#[derive(Clone, Debug)]
pub struct FakeClock {
    /// The time the clock was created at.
    base: Instant,

    /// How far the clock has been moved forward.
    offset: Arc<Mutex<Duration>>,
}

impl FakeClock {
    /// Creates a new clock starting at the current system time.
    pub fn new() -> Self {
        FakeClock {
            base: Instant::now(),
            offset: Default::default(),
        }
    }

    /// Adjust the current time by adding a [Duration]
    pub fn adjust_time(&self, adjust: Duration) {
        let mut offset = self.offset.lock();
        *offset = offset.saturating_add(adjust);
    }

    /// Returns how far the clock has been moved forward.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fake_clock() {
        let clock = FakeClock::new();
        let start = clock.now();
        let shared = clock.clone();
        shared.adjust_time(Duration::from_secs(61));
        assert_eq!(clock.now() - start, Duration::from_secs(61));
        assert_eq!(clock.elapsed(), Duration::from_secs(61));
    }
}
