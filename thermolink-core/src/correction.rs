//! Raw-to-physical conversion with a runtime-adjustable offset
//!
//! Converts ADC counts to degrees Celsius in three fixed steps:
//! - counts → volts (`raw / 1023 * reference_voltage`)
//! - volts → fitted volts (empirical `correction_factor`)
//! - fitted volts → °C (10 mV per °C)
//!
//! then subtracts the correction offset, the only piece of state that
//! calibration commands are allowed to change.

use crate::constants::sensors::{
    ADC_FULL_SCALE, CELSIUS_PER_VOLT, DEFAULT_OFFSET_C, DEFAULT_REFERENCE_VOLTAGE,
    FIT_REFERENCE_COUNTS, FIT_REFERENCE_VOLTS,
};

/// Fixed linear transform from ADC counts to °C
///
/// Both parameters are configuration constants, never runtime state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcTransform {
    reference_voltage: f32,
    correction_factor: f32,
}

impl AdcTransform {
    /// Transform for a board with the given ADC reference voltage
    ///
    /// The correction factor is derived from the empirical fit point
    /// (0.29 V read as 93 counts) at that reference.
    pub fn new(reference_voltage: f32) -> Self {
        let correction_factor =
            FIT_REFERENCE_VOLTS / (FIT_REFERENCE_COUNTS / ADC_FULL_SCALE * reference_voltage);
        Self {
            reference_voltage,
            correction_factor,
        }
    }

    /// ADC reference voltage in volts
    pub fn reference_voltage(&self) -> f32 {
        self.reference_voltage
    }

    /// Empirical correction factor
    pub fn correction_factor(&self) -> f32 {
        self.correction_factor
    }

    /// Convert raw counts to uncorrected °C
    #[inline]
    pub fn raw_to_physical(&self, raw: f32) -> f32 {
        let voltage = (raw / ADC_FULL_SCALE * self.reference_voltage) * self.correction_factor;
        voltage * CELSIUS_PER_VOLT
    }
}

impl Default for AdcTransform {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_VOLTAGE)
    }
}

/// Correction applied to every reading
///
/// `set_offset` accepts any float, including NaN and infinities. A
/// non-finite offset is logged but still applied; callers that want range
/// checks must do them before dispatching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionModel {
    transform: AdcTransform,
    offset: f32,
}

impl CorrectionModel {
    /// Model with an explicit transform and starting offset
    pub fn new(transform: AdcTransform, offset: f32) -> Self {
        Self { transform, offset }
    }

    /// Corrected value: `raw_to_physical(raw) - offset`
    #[inline]
    pub fn apply(&self, raw: f32) -> f32 {
        self.transform.raw_to_physical(raw) - self.offset
    }

    /// Replace the offset unconditionally
    pub fn set_offset(&mut self, value: f32) {
        if !value.is_finite() {
            log_warn!("applying non-finite correction offset {}", value);
        }
        self.offset = value;
    }

    /// Current correction offset
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Underlying fixed transform
    pub fn transform(&self) -> &AdcTransform {
        &self.transform
    }
}

impl Default for CorrectionModel {
    fn default() -> Self {
        Self::new(AdcTransform::default(), DEFAULT_OFFSET_C)
    }
}
