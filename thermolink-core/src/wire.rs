//! Wire formats for the calibrate and status channels
//!
//! ## Calibration (inbound)
//!
//! Two payload shapes resolve to the same single float:
//! - legacy: the bare number as text, e.g. `4.5`
//! - JSON: `{"device": "termometer", "value": 4.5}`
//!
//! A JSON command naming another device is not an error; it is simply not
//! for this agent and resolves to `None`.
//!
//! ## Telemetry (outbound)
//!
//! `{"deviceId": "termometer", "temperature": "21.37"}`, where the
//! temperature is either a two-decimal string (firmware default) or a bare
//! number, depending on [`TemperatureFormat`].

use alloc::{format, string::String, vec::Vec};

use serde::{Deserialize, Serialize};

use crate::{config::TemperatureFormat, errors::PayloadError};

/// JSON calibration command, shared by the broker and HTTP ingress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCommand {
    /// Target device; absent means "whoever receives this"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// New correction value
    pub value: f32,
}

impl CalibrationCommand {
    /// Whether this command is addressed to `device_id`
    pub fn targets(&self, device_id: &str) -> bool {
        match self.device.as_deref() {
            None | Some("") => true,
            Some(device) => device == device_id,
        }
    }
}

/// Decode a calibrate-channel payload into the value for `device_id`
///
/// Returns `Ok(None)` when a JSON command targets a different device.
pub fn decode_calibration(payload: &[u8], device_id: &str) -> Result<Option<f32>, PayloadError> {
    let text = core::str::from_utf8(payload).map_err(|_| PayloadError::NotUtf8)?;
    let text = text.trim();

    if text.is_empty() {
        return Err(PayloadError::Empty);
    }

    if text.starts_with('{') {
        let command: CalibrationCommand =
            serde_json::from_str(text).map_err(|_| PayloadError::MalformedJson)?;
        return Ok(command.targets(device_id).then_some(command.value));
    }

    text.parse::<f32>().map(Some).map_err(|_| PayloadError::NotANumber)
}

/// Legacy numeric form of a calibration value, as mirrored to the broker
///
/// Shortest text that parses back to exactly `value`.
pub fn encode_calibration(value: f32) -> String {
    format!("{}", value)
}

/// Temperature field: the firmware sends text, newer agents may send a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemperatureField {
    /// Bare JSON number
    Number(f32),
    /// Decimal text, e.g. `"21.37"`
    Text(String),
}

impl TemperatureField {
    /// Numeric value, if the text form parses
    pub fn value(&self) -> Option<f32> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Status-channel telemetry message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    /// Reporting device
    #[serde(rename = "deviceId")]
    pub device_id: String,
    /// Corrected temperature
    pub temperature: TemperatureField,
}

impl TelemetryMessage {
    /// Build a message for a corrected reading
    pub fn new(device_id: &str, temperature: f32, format: TemperatureFormat) -> Self {
        let temperature = match format {
            TemperatureFormat::Text => TemperatureField::Text(format!("{:.2}", temperature)),
            TemperatureFormat::Number => TemperatureField::Number(temperature),
        };
        Self {
            device_id: String::from(device_id),
            temperature,
        }
    }

    /// Serialize to JSON bytes
    pub fn encode(&self) -> Vec<u8> {
        // Two plain fields; serialization cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parse a status-channel payload
    pub fn decode(payload: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(payload).map_err(|_| PayloadError::MalformedJson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_numeric_payload() {
        assert_eq!(decode_calibration(b"4.5", "termometer"), Ok(Some(4.5)));
        assert_eq!(decode_calibration(b"  -2\n", "termometer"), Ok(Some(-2.0)));
    }

    #[test]
    fn json_payload_for_this_device() {
        let payload = br#"{"device":"termometer","value":3.75}"#;
        assert_eq!(decode_calibration(payload, "termometer"), Ok(Some(3.75)));
    }

    #[test]
    fn json_payload_without_device_applies() {
        assert_eq!(decode_calibration(br#"{"value":1}"#, "termometer"), Ok(Some(1.0)));
    }

    #[test]
    fn json_payload_for_other_device_is_skipped() {
        let payload = br#"{"device":"hygrometer","value":3.75}"#;
        assert_eq!(decode_calibration(payload, "termometer"), Ok(None));
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert_eq!(decode_calibration(b"", "t"), Err(PayloadError::Empty));
        assert_eq!(decode_calibration(b"warm", "t"), Err(PayloadError::NotANumber));
        assert_eq!(decode_calibration(b"{\"value\":", "t"), Err(PayloadError::MalformedJson));
        assert_eq!(decode_calibration(br#"{"device":"t"}"#, "t"), Err(PayloadError::MalformedJson));
        assert_eq!(decode_calibration(&[0xff, 0xfe], "t"), Err(PayloadError::NotUtf8));
    }

    #[test]
    fn telemetry_text_round_trip() {
        let message = TelemetryMessage::new("termometer", 21.3749, TemperatureFormat::Text);
        let bytes = message.encode();
        assert_eq!(
            core::str::from_utf8(&bytes).unwrap(),
            r#"{"deviceId":"termometer","temperature":"21.37"}"#
        );

        let decoded = TelemetryMessage::decode(&bytes).unwrap();
        assert_eq!(decoded.device_id, "termometer");
        assert!((decoded.temperature.value().unwrap() - 21.3749).abs() <= 0.005);
    }

    #[test]
    fn telemetry_number_round_trip() {
        let message = TelemetryMessage::new("termometer", 154.65591, TemperatureFormat::Number);
        let decoded = TelemetryMessage::decode(&message.encode()).unwrap();
        assert!(matches!(decoded.temperature, TemperatureField::Number(_)));
        assert!((decoded.temperature.value().unwrap() - 154.65591).abs() < 1e-4);
    }

    #[test]
    fn mirrored_calibration_decodes_back() {
        let text = encode_calibration(2.5);
        assert_eq!(text, "2.5");
        assert_eq!(decode_calibration(text.as_bytes(), "any"), Ok(Some(2.5)));
    }

    #[test]
    fn mirrored_calibration_keeps_every_digit() {
        for value in [1.234_f32, -0.001, 21.374_9, 1e-7, 3.0] {
            let text = encode_calibration(value);
            assert_eq!(decode_calibration(text.as_bytes(), "any"), Ok(Some(value)), "{}", text);
        }
    }
}
