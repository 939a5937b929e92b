//! Constants for the thermolink agent
//!
//! Centralized values used throughout the agent. Sensor constants describe
//! the analog front-end, time constants drive the loop's schedules, and the
//! limits below size the bounded (heap-free) collections.
//!
//! ## Organization
//!
//! - **Sensors**: ADC range, reference voltage, empirical fit
//! - **Time**: telemetry interval, retry delays, blink cadence
//! - **Limits**: capacities of fixed-size storage

/// Analog front-end characteristics and the empirical correction fit.
pub mod sensors;

/// Intervals and delays for telemetry, reconnection and diagnostics.
pub mod time;

// Re-export commonly used constants for convenience
pub use sensors::{
    ADC_FULL_SCALE, DEFAULT_OFFSET_C, DEFAULT_REFERENCE_VOLTAGE, OPERATING_VOLTAGE,
};

pub use time::{
    BLINK_HALF_PERIOD_MS, DEFAULT_LINK_RETRY_MS, DEFAULT_SESSION_RETRY_MS,
    DEFAULT_TELEMETRY_INTERVAL_MS, MS_PER_SECOND,
};

// ===== LIMITS =====

/// Maximum number of calibration channels a registry can hold.
pub const MAX_CHANNELS: usize = 8;

/// Maximum length of a channel identifier in bytes.
///
/// Topics look like `dev_test/termometer/calibrate`; 96 bytes leaves room
/// for deeper prefixes.
pub const MAX_CHANNEL_LEN: usize = 96;

/// Consecutive failed handshakes before the link itself is re-associated.
pub const RELINK_AFTER_SESSION_FAILURES: u32 = 3;

/// Control requests drained from the HTTP surface per tick.
///
/// Bounds the time step 1 of the loop can take.
pub const MAX_CONTROL_REQUESTS_PER_TICK: usize = 4;
