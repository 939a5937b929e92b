//! Agent counters and the status snapshot

use alloc::string::String;

use serde::Serialize;

use crate::{
    calibration::DispatchOutcome,
    connectivity::{ConnectionState, ConnectionStats},
    constants::OPERATING_VOLTAGE,
    scheduler::SensorReading,
    traits::LinkInfo,
};

/// Counters kept by the agent loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    /// Calibration values that reached a handler
    pub calibrations_applied: u32,
    /// Calibration values on channels with no handler
    pub calibrations_unmapped: u32,
    /// Inbound payloads that failed to decode
    pub payloads_rejected: u32,
    /// JSON commands addressed to another device
    pub commands_ignored: u32,
    /// Own calibration mirrors received back from the broker and skipped
    pub mirrors_echoed: u32,
    /// Sensor readings taken by the scheduler
    pub readings_taken: u32,
    /// Readings handed to the broker session
    pub telemetry_sent: u32,
    /// Readings taken while disconnected
    pub telemetry_skipped: u32,
    /// Control requests serviced
    pub control_requests: u32,
}

impl AgentStats {
    pub(crate) fn record_dispatch(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Applied => {
                self.calibrations_applied = self.calibrations_applied.wrapping_add(1)
            }
            DispatchOutcome::Unmapped => {
                self.calibrations_unmapped = self.calibrations_unmapped.wrapping_add(1)
            }
        }
    }
}

/// Point-in-time view of the agent for the status surface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Device name
    pub device_id: String,
    /// Crate version
    pub version: &'static str,
    /// Seconds since the agent was built
    pub uptime_secs: u32,
    /// Connection state
    pub state: ConnectionState,
    /// Link details
    pub link: LinkInfo,
    /// Current correction offset
    pub offset: f32,
    /// Corrected temperature, fresh when the sensor answered
    pub temperature: Option<f32>,
    /// ADC counts behind `temperature`
    pub raw: Option<u16>,
    /// Last reading taken for telemetry
    #[serde(skip)]
    pub last_telemetry: Option<SensorReading>,
    /// Milliseconds until the next connection attempt
    pub retry_in_ms: u32,
    /// Connection counters
    pub connection: ConnectionStats,
    /// Agent counters
    pub agent: AgentStats,
}

impl StatusSnapshot {
    /// Supply voltage shown on the status page
    pub fn operating_voltage(&self) -> f32 {
        OPERATING_VOLTAGE
    }
}
