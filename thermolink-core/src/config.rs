//! Agent configuration document
//!
//! One JSON blob, loaded once before any network activity and read-only
//! afterwards. The six fields the firmware has always required keep their
//! original names (`mqttServer`, `SSID`, ...); everything else is optional
//! and falls back to the firmware's built-in values.
//!
//! ```json
//! {
//!   "mqttServer": "broker.local",
//!   "mqttPort": 8883,
//!   "mqttUser": "probe",
//!   "mqttPassword": "secret",
//!   "SSID": "lab-2G",
//!   "wifiPassword": "secret",
//!   "telemetryIntervalMs": 5000
//! }
//! ```

use alloc::{format, string::String};

use serde::{Deserialize, Serialize};

use crate::{
    calibration::{channel_name, ChannelName},
    constants::{
        sensors::{DEFAULT_OFFSET_C, DEFAULT_REFERENCE_VOLTAGE},
        time::{
            DEFAULT_KEEP_ALIVE_SECS, DEFAULT_LINK_RETRY_MS, DEFAULT_SESSION_RETRY_MS,
            DEFAULT_TELEMETRY_INTERVAL_MS,
        },
    },
    errors::{CalibrationError, ConfigError},
};

/// How the telemetry temperature field is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureFormat {
    /// Two-decimal string, as the firmware sends it
    #[default]
    Text,
    /// Bare JSON number
    Number,
}

/// Complete agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Broker host name or address
    pub mqtt_server: String,
    /// Broker port
    pub mqtt_port: u16,
    /// Broker user name
    pub mqtt_user: String,
    /// Broker password
    pub mqtt_password: String,
    /// Network name the link associates with
    #[serde(rename = "SSID")]
    pub ssid: String,
    /// Network passphrase
    pub wifi_password: String,

    /// Device name used in payloads and topics
    #[serde(default = "default_device_id")]
    pub device_id: String,
    /// Topic namespace in front of the device name
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// Broker client id; derived from the device id when absent
    #[serde(default)]
    pub client_id: Option<String>,
    /// Use TLS to the broker
    #[serde(default)]
    pub tls: bool,
    /// Broker keep-alive in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u16,

    /// Telemetry publish interval
    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: u32,
    /// Telemetry temperature encoding
    #[serde(default)]
    pub temperature_format: TemperatureFormat,

    /// Correction offset at start-up
    #[serde(default = "default_initial_offset")]
    pub initial_offset: f32,
    /// ADC reference voltage
    #[serde(default = "default_reference_voltage")]
    pub reference_voltage: f32,

    /// Delay between link association attempts
    #[serde(default = "default_link_retry_ms")]
    pub link_retry_ms: u32,
    /// Delay between broker handshake attempts
    #[serde(default = "default_session_retry_ms")]
    pub session_retry_ms: u32,
    /// Cap for exponential handshake backoff; constant backoff when absent
    #[serde(default)]
    pub max_session_retry_ms: Option<u32>,

    /// Port for the HTTP control surface
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_device_id() -> String {
    String::from("termometer")
}

fn default_topic_prefix() -> String {
    String::from("dev_test")
}

fn default_keep_alive_secs() -> u16 {
    DEFAULT_KEEP_ALIVE_SECS
}

fn default_telemetry_interval_ms() -> u32 {
    DEFAULT_TELEMETRY_INTERVAL_MS
}

fn default_initial_offset() -> f32 {
    DEFAULT_OFFSET_C
}

fn default_reference_voltage() -> f32 {
    DEFAULT_REFERENCE_VOLTAGE
}

fn default_link_retry_ms() -> u32 {
    DEFAULT_LINK_RETRY_MS
}

fn default_session_retry_ms() -> u32 {
    DEFAULT_SESSION_RETRY_MS
}

fn default_http_port() -> u16 {
    8080
}

impl AgentConfig {
    /// Parse and validate a config document
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(document).map_err(|err| ConfigError::Parse(format!("{}", err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the agent cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt_server.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "mqttServer", reason: "must not be empty" });
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::Invalid { field: "mqttPort", reason: "must be non-zero" });
        }
        if self.device_id.trim().is_empty() || self.device_id.contains(['/', '+', '#']) {
            return Err(ConfigError::Invalid {
                field: "deviceId",
                reason: "must be a non-empty topic segment",
            });
        }
        if self.telemetry_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "telemetryIntervalMs",
                reason: "must be non-zero",
            });
        }
        if !(self.reference_voltage.is_finite() && self.reference_voltage > 0.0) {
            return Err(ConfigError::Invalid {
                field: "referenceVoltage",
                reason: "must be a positive number",
            });
        }
        if let Some(cap) = self.max_session_retry_ms {
            if cap < self.session_retry_ms {
                return Err(ConfigError::Invalid {
                    field: "maxSessionRetryMs",
                    reason: "must not be below sessionRetryMs",
                });
            }
        }
        DeviceTopics::new(&self.topic_prefix, &self.device_id).map_err(|_| ConfigError::Invalid {
            field: "topicPrefix",
            reason: "resulting topics are too long",
        })?;
        Ok(())
    }

    /// Broker client id
    pub fn client_id(&self) -> String {
        match &self.client_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("thermolink-{}", self.device_id),
        }
    }

    /// Topic set for this device
    pub fn topics(&self) -> Result<DeviceTopics, CalibrationError> {
        DeviceTopics::new(&self.topic_prefix, &self.device_id)
    }
}

/// Topics derived from the device identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    prefix: String,
    device_id: String,
    calibrate: ChannelName,
    status: ChannelName,
}

impl DeviceTopics {
    /// `<prefix>/<device>/calibrate` and `<prefix>/<device>/status`
    ///
    /// An empty prefix drops the leading segment.
    pub fn new(prefix: &str, device_id: &str) -> Result<Self, CalibrationError> {
        let prefix = String::from(prefix.trim_end_matches('/'));
        let calibrate = channel_name(&Self::join(&prefix, device_id, "calibrate"))?;
        let status = channel_name(&Self::join(&prefix, device_id, "status"))?;
        Ok(Self {
            prefix,
            device_id: String::from(device_id),
            calibrate,
            status,
        })
    }

    fn join(prefix: &str, device_id: &str, leaf: &str) -> String {
        if prefix.is_empty() {
            format!("{}/{}", device_id, leaf)
        } else {
            format!("{}/{}/{}", prefix, device_id, leaf)
        }
    }

    /// This agent's device id
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Inbound calibration topic
    pub fn calibrate(&self) -> &str {
        &self.calibrate
    }

    /// Outbound telemetry topic
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Calibration channel for another device under the same prefix
    ///
    /// Lets the HTTP adapter turn a `device` field into the same channel
    /// the broker would deliver on.
    pub fn calibrate_for(&self, device_id: &str) -> String {
        if device_id.is_empty() || device_id == self.device_id {
            return String::from(self.calibrate());
        }
        Self::join(&self.prefix, device_id, "calibrate")
    }
}
