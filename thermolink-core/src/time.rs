//! Time management for edge devices
//!
//! The agent measures everything against a 32-bit millisecond counter that
//! starts at boot. The counter wraps after ~49.7 days, so intervals are
//! always computed with [`elapsed_ms`] (wrapping subtraction) and never by
//! ordering two timestamps directly.
//!
//! Provides:
//! - [`TimeSource`] abstraction over the platform clock
//! - [`MonotonicTime`] backed by `std::time::Instant` (std only)
//! - [`MockTimeSource`] for deterministic tests
//! - [`NotBefore`] gate used by the reconnect path instead of sleeping

use core::cell::Cell;

/// Milliseconds since boot, wrapping at `u32::MAX`
pub type Timestamp = u32;

/// Milliseconds elapsed from `earlier` to `now`, correct across one wrap
/// of the counter.
#[inline]
pub const fn elapsed_ms(now: Timestamp, earlier: Timestamp) -> u32 {
    now.wrapping_sub(earlier)
}

/// Source of monotonic time for the agent loop
pub trait TimeSource {
    /// Current counter value in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs monotonic)
    fn is_wall_clock(&self) -> bool {
        false
    }

    /// Get precision in milliseconds
    fn precision_ms(&self) -> u32 {
        1
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn is_wall_clock(&self) -> bool {
        (**self).is_wall_clock()
    }

    fn precision_ms(&self) -> u32 {
        (**self).precision_ms()
    }
}

/// Monotonic time source anchored at construction
///
/// Truncates the host's 64-bit instant to the same 32-bit wrapping counter
/// the firmware uses, so host runs exercise the wraparound path too.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicTime {
    origin: std::time::Instant,
    start_ms: Timestamp,
}

#[cfg(feature = "std")]
impl MonotonicTime {
    /// Counter starting at 0 now
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Counter starting at `start_ms` now; useful to soak-test the wrap
    pub fn starting_at(start_ms: Timestamp) -> Self {
        Self {
            origin: std::time::Instant::now(),
            start_ms,
        }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicTime {
    fn now(&self) -> Timestamp {
        // Truncation is the wrap.
        let elapsed = self.origin.elapsed().as_millis() as u64 as u32;
        self.start_ms.wrapping_add(elapsed)
    }
}

/// Manually driven time source for testing
///
/// Uses interior mutability so a test can hold a shared reference in the
/// agent and still advance the clock between ticks.
#[derive(Debug, Default)]
pub struct MockTimeSource {
    now: Cell<Timestamp>,
}

impl MockTimeSource {
    /// Create a mock clock reading `start`
    pub fn new(start: Timestamp) -> Self {
        Self { now: Cell::new(start) }
    }

    /// Jump to an absolute counter value
    pub fn set(&self, timestamp: Timestamp) {
        self.now.set(timestamp);
    }

    /// Advance by `ms`, wrapping like the hardware counter
    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}

/// "Do not retry before T" gate
///
/// Stores the arming time and the delay rather than an absolute deadline,
/// so the check stays valid when the deadline lands past the counter wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotBefore {
    armed_at: Timestamp,
    delay_ms: u32,
}

impl NotBefore {
    /// A gate that is already open
    pub const fn open() -> Self {
        Self { armed_at: 0, delay_ms: 0 }
    }

    /// Close the gate for `delay_ms` starting at `now`
    pub fn arm(&mut self, now: Timestamp, delay_ms: u32) {
        self.armed_at = now;
        self.delay_ms = delay_ms;
    }

    /// Open the gate immediately
    pub fn release(&mut self) {
        self.delay_ms = 0;
    }

    /// True once the delay has fully elapsed
    pub fn is_open(&self, now: Timestamp) -> bool {
        elapsed_ms(now, self.armed_at) >= self.delay_ms
    }

    /// Milliseconds left before the gate opens (0 when open)
    pub fn remaining(&self, now: Timestamp) -> u32 {
        self.delay_ms.saturating_sub(elapsed_ms(now, self.armed_at))
    }
}
