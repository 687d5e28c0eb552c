//! Time sources for [`IntegerPidController::update_with_clock`].
//!
//! A clock reports a monotonic reading as a [`Duration`] since an arbitrary
//! epoch; only differences between readings are meaningful.
//!
//! [`IntegerPidController::update_with_clock`]: crate::pid::IntegerPidController::update_with_clock

use core::cell::Cell;
use core::time::Duration;

pub trait Clock {
    /// Current reading.
    fn now(&self) -> Duration;

    /// Time elapsed from `earlier` to `now`, zero if the clock went backwards.
    fn elapsed_since(&self, earlier: Duration, now: Duration) -> Duration {
        now.saturating_sub(earlier)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Host monotonic clock backed by [`std::time::Instant`].
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct StdClock;

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now(&self) -> Duration {
        use std::sync::OnceLock;
        use std::time::Instant;

        static ORIGIN: OnceLock<Instant> = OnceLock::new();
        ORIGIN.get_or_init(Instant::now).elapsed()
    }
}

/// Clock backed by the embassy time driver.
#[cfg(feature = "embassy")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embassy")]
impl Clock for EmbassyClock {
    fn now(&self) -> Duration {
        Duration::from_micros(embassy_time::Instant::now().as_micros())
    }
}

/// Caller-driven clock for simulated time.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub const fn new() -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }

    /// Jump to an absolute reading.
    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
