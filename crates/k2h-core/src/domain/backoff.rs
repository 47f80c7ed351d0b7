//! Exponential backoff policy for reconnect attempts.
//!
//! Each connection supervisor owns one [`Backoff`] instance for the lifetime
//! of the process.  The delay doubles on every consecutive failure, is capped
//! at a maximum, and snaps back to the minimum as soon as a connection reaches
//! the ready state.
//!
//! With the default bounds the delay sequence under repeated failure is
//! exactly `2, 4, 8, 16, 32, 60, 60, 60, …` seconds.

use std::time::Duration;

/// Lower bound for the reconnect delay.
pub const MIN_DELAY: Duration = Duration::from_secs(2);

/// Upper bound for the reconnect delay.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

/// Reconnect delay state for one connection supervisor.
///
/// The struct is deliberately not `Copy`: there is exactly one per supervisor,
/// it is reset (never recreated) on success, and handing out copies would make
/// it easy to fork the delay sequence by accident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
    min: Duration,
    max: Duration,
}

impl Backoff {
    /// Creates a backoff with custom bounds.
    ///
    /// `min` is also the initial delay.  If `max < min`, the first delay is
    /// still `min`; every delay after that is capped at `max`.
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            current: min,
            min,
            max,
        }
    }

    /// Returns the delay to wait before the next attempt and advances the
    /// schedule: the stored delay doubles, capped at the maximum.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Snaps the delay back to the minimum.  Called on every successful
    /// transition to the ready state.
    pub fn reset(&mut self) {
        self.current = self.min;
    }

    /// The delay the next call to [`next_delay`](Self::next_delay) will return.
    pub fn current(&self) -> Duration {
        self.current
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(MIN_DELAY, MAX_DELAY)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
