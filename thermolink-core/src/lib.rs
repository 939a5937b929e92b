//! Runtime engine for the thermolink sensor agent
//!
//! Samples one analog sensor, corrects the reading with a runtime-adjustable
//! offset, publishes telemetry on a timer and accepts remote calibration
//! commands. Everything runs inside a single cooperative loop; nothing in
//! this crate sleeps or spawns.
//!
//! Key constraints:
//! - One logical thread of control, re-entered every tick
//! - Reconnection never blocks the loop (not-before gates, no sleeps)
//! - Bounded storage for calibration channels (`heapless`)
//! - Monotonic millisecond clock that wraps after ~49.7 days
//!
//! ```no_run
//! use thermolink_core::{CalibrationAction, CalibrationRegistry, CorrectionModel};
//!
//! let mut model = CorrectionModel::default();
//! let mut registry = CalibrationRegistry::new();
//! registry.register("dev_test/termometer/calibrate", CalibrationAction::SetOffset).unwrap();
//!
//! registry.dispatch("dev_test/termometer/calibrate", 2.5, &mut model);
//! assert_eq!(model.offset(), 2.5);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

#[macro_use]
mod macros;

pub mod agent;
pub mod calibration;
pub mod config;
pub mod connectivity;
pub mod constants;
pub mod correction;
pub mod errors;
pub mod scheduler;
pub mod time;
pub mod traits;
pub mod wire;

// Public API
pub use agent::{Agent, AgentBuilder, AgentStats, ControlRequest, StatusSnapshot, TickReport};
pub use calibration::{CalibrationAction, CalibrationRegistry, ChannelName, DispatchOutcome};
pub use config::{AgentConfig, DeviceTopics, TemperatureFormat};
pub use connectivity::{ConnectionState, ConnectionStats, ConnectivityManager, RetryPolicy};
pub use correction::{AdcTransform, CorrectionModel};
pub use errors::{AgentError, CalibrationError, ConfigError, PayloadError};
pub use scheduler::{SensorReading, TelemetryScheduler};
pub use time::{elapsed_ms, TimeSource, Timestamp};
pub use traits::{AnalogSensor, BrokerSession, ControlSurface, Indicator, LinkInfo, NetworkLink};

/// Crate version, reported on the status page.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
