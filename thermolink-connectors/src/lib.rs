//! Host adapters for the thermolink agent
//!
//! ## Overview
//!
//! `thermolink-core` is written against narrow traits (`NetworkLink`,
//! `BrokerSession`, `AnalogSensor`, `Indicator`, `ControlSurface`). This
//! crate provides their implementations for a Linux host or gateway.
//!
//! | Adapter                  | Trait            | Backing                        |
//! |--------------------------|------------------|--------------------------------|
//! | [`link::TcpProbeLink`]   | `NetworkLink`    | TCP connect probe to the broker |
//! | [`mqtt::MqttSession`]    | `BrokerSession`  | `rumqttc` sync client           |
//! | [`hardware::IioAdc`]     | `AnalogSensor`   | sysfs IIO raw channel           |
//! | [`hardware::SimulatedAdc`] | `AnalogSensor` | deterministic waveform          |
//! | [`hardware::SysfsLed`]   | `Indicator`      | `/sys/class/leds` brightness    |
//! | [`hardware::LogIndicator`] | `Indicator`    | log lines                       |
//! | [`http::HttpControlSurface`] | `ControlSurface` | axum server on its own runtime |
//!
//! ## Threading
//!
//! Everything except the HTTP server runs on the agent's loop thread. Work
//! that can block for long (the link probe's DNS lookup and connect, the
//! MQTT CONNACK wait) runs on a short-lived worker thread and is collected
//! with `nb` polling on later ticks. Once connected, the MQTT session
//! drives `rumqttc`'s connection from inside `poll`, bounded by a short
//! timeout, so it must never be called from within a tokio runtime. The
//! HTTP server runs on a separate runtime and only talks to the loop
//! through a bounded queue.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use thermolink_connectors::{link::TcpProbeLink, mqtt::{MqttConfig, MqttSession}};
//! use thermolink_core::AgentConfig;
//!
//! let config = AgentConfig::from_json(&std::fs::read_to_string("config.json")?)?;
//! let link = TcpProbeLink::from_config(&config);
//! let session = MqttSession::new(MqttConfig::from_agent_config(&config));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod hardware;
pub mod link;

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "http")]
pub mod http;

// Re-export common types
pub use hardware::{HardwareError, IioAdc, LogIndicator, SimulatedAdc, SysfsLed};
pub use link::{LinkError, TcpProbeLink};

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConfig, MqttError, MqttSession};

#[cfg(feature = "http")]
pub use http::{HttpControlBuilder, HttpControlHandle, HttpControlSurface, HttpError};
