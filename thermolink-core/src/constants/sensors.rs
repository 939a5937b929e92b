//! Analog Front-End Constants
//!
//! The sensor is an analog temperature probe read through a 10-bit ADC.
//! Conversion to degrees goes raw counts → volts → empirical fit → °C.

/// Full-scale count of the 10-bit ADC.
pub const ADC_FULL_SCALE: f32 = 1023.0;

/// Default ADC reference voltage (V).
///
/// Adjust per board when the real reference is known.
pub const DEFAULT_REFERENCE_VOLTAGE: f32 = 1.0;

/// Volts measured at the calibration point of the empirical fit.
pub const FIT_REFERENCE_VOLTS: f32 = 0.29;

/// ADC counts read at the calibration point of the empirical fit.
pub const FIT_REFERENCE_COUNTS: f32 = 93.0;

/// Probe sensitivity: 10 mV per °C.
pub const CELSIUS_PER_VOLT: f32 = 100.0;

/// Correction offset applied at start-up (°C).
pub const DEFAULT_OFFSET_C: f32 = 5.0;

/// Supply voltage shown on the status page (V).
pub const OPERATING_VOLTAGE: f32 = 3.3;
