//! Hardware-facing traits
//!
//! ADC reads follow the embedded `nb` convention: a conversion that is not
//! ready yet returns `nb::Error::WouldBlock` and the caller tries again on
//! the next tick instead of spinning.

use core::fmt::Display;

/// Single-channel analog input
///
/// ## Example Implementation
///
/// ```rust
/// use thermolink_core::traits::AnalogSensor;
///
/// struct FixedAdc(u16);
///
/// impl AnalogSensor for FixedAdc {
///     type Error = core::convert::Infallible;
///
///     fn read_raw(&mut self) -> nb::Result<u16, Self::Error> {
///         Ok(self.0)
///     }
/// }
/// ```
pub trait AnalogSensor {
    /// Read failure
    type Error: Display;

    /// Raw ADC counts (0..=1023 on a 10-bit converter)
    fn read_raw(&mut self) -> nb::Result<u16, Self::Error>;
}

/// On/off diagnostic output, usually the board LED
pub trait Indicator {
    /// Drive the indicator
    fn set(&mut self, on: bool);
}

/// Indicator for hosts without one
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    fn set(&mut self, _on: bool) {}
}
