//! Fixed-interval telemetry scheduling
//!
//! The scheduler is polled every tick, connected or not. Sampling keeps
//! going while offline; only publishing is gated by connectivity.

use crate::{
    correction::CorrectionModel,
    time::{elapsed_ms, Timestamp},
    traits::AnalogSensor,
};

/// One corrected sample, produced and consumed within a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// ADC counts
    pub raw: u16,
    /// Corrected value in °C
    pub corrected: f32,
    /// When the sample was taken
    pub timestamp: Timestamp,
}

impl SensorReading {
    /// Read the sensor once and correct the result
    pub fn take<A: AnalogSensor>(
        sensor: &mut A,
        model: &CorrectionModel,
        now: Timestamp,
    ) -> nb::Result<Self, A::Error> {
        let raw = sensor.read_raw()?;
        Ok(Self {
            raw,
            corrected: model.apply(f32::from(raw)),
            timestamp: now,
        })
    }
}

/// Fires once per `interval_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryScheduler {
    last_fire: Timestamp,
    interval_ms: u32,
}

impl TelemetryScheduler {
    /// Scheduler whose first slot falls one interval after `start`
    pub fn new(interval_ms: u32, start: Timestamp) -> Self {
        Self {
            last_fire: start,
            interval_ms,
        }
    }

    /// Configured interval
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Timestamp of the last slot taken
    pub fn last_fire(&self) -> Timestamp {
        self.last_fire
    }

    /// Whether a slot is due at `now`
    pub fn is_due(&self, now: Timestamp) -> bool {
        elapsed_ms(now, self.last_fire) >= self.interval_ms
    }

    /// Take a reading if a slot is due
    ///
    /// A conversion that is not ready (`WouldBlock`) leaves the slot open
    /// for the next tick. A read error consumes the slot so a broken sensor
    /// does not turn every tick into a retry.
    pub fn tick<A: AnalogSensor>(
        &mut self,
        now: Timestamp,
        sensor: &mut A,
        model: &CorrectionModel,
    ) -> Option<SensorReading> {
        if !self.is_due(now) {
            return None;
        }

        match SensorReading::take(sensor, model, now) {
            Ok(reading) => {
                self.last_fire = now;
                Some(reading)
            }
            Err(nb::Error::WouldBlock) => None,
            Err(nb::Error::Other(err)) => {
                log_warn!("sensor read failed: {}", err);
                self.last_fire = now;
                None
            }
        }
    }
}
