//! Time-Related Constants
//!
//! Intervals and delays used by the agent loop. All values are milliseconds
//! on the wrapping boot counter unless the name says otherwise.

/// Milliseconds per second.
pub const MS_PER_SECOND: u32 = 1000;

/// Default telemetry publish interval (milliseconds).
pub const DEFAULT_TELEMETRY_INTERVAL_MS: u32 = 5000;

/// Delay between network association attempts (milliseconds).
pub const DEFAULT_LINK_RETRY_MS: u32 = 500;

/// Delay between broker handshake attempts (milliseconds).
///
/// Constant by default; the retry policy may grow it exponentially up to a
/// configured cap.
pub const DEFAULT_SESSION_RETRY_MS: u32 = 5000;

/// Broker keep-alive (seconds).
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 15;

/// Indicator on/off half-period of the blink diagnostic (milliseconds).
pub const BLINK_HALF_PERIOD_MS: u32 = 250;

/// Status page auto-refresh period (seconds).
pub const STATUS_REFRESH_SECS: u32 = 3;
