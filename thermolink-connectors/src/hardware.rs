//! ADC and indicator adapters for Linux hosts
//!
//! ## Supported Backends
//!
//! 1. **IIO**: raw counts from an industrial-I/O sysfs attribute, e.g.
//!    `/sys/bus/iio/devices/iio:device0/in_voltage0_raw`
//! 2. **Simulated**: deterministic triangle wave for bench runs
//! 3. **LED**: `/sys/class/leds/<name>/brightness`
//! 4. **Log**: indicator that only logs, for hosts without an LED

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use thermolink_core::traits::{AnalogSensor, Indicator};
use thiserror::Error;

/// Largest count a 10-bit converter reports
pub const ADC_MAX_COUNTS: u16 = 1023;

/// Hardware adapter errors
#[derive(Debug, Error)]
pub enum HardwareError {
    /// Attribute could not be read or written
    #[error("{path}: {source}")]
    Io {
        /// sysfs attribute
        path: PathBuf,
        /// I/O error
        source: std::io::Error,
    },

    /// Attribute content was not a count
    #[error("{path}: unexpected value {value:?}")]
    Parse {
        /// sysfs attribute
        path: PathBuf,
        /// Text that failed to parse
        value: String,
    },
}

/// ADC channel exposed through sysfs IIO
///
/// ## Example
///
/// ```rust,no_run
/// use thermolink_connectors::IioAdc;
/// use thermolink_core::traits::AnalogSensor;
///
/// let mut adc = IioAdc::new("/sys/bus/iio/devices/iio:device0/in_voltage0_raw");
/// let counts = nb::block!(adc.read_raw())?;
/// # Ok::<(), thermolink_connectors::HardwareError>(())
/// ```
#[derive(Debug, Clone)]
pub struct IioAdc {
    path: PathBuf,
}

impl IioAdc {
    /// Read counts from `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Attribute being read
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnalogSensor for IioAdc {
    type Error = HardwareError;

    fn read_raw(&mut self) -> nb::Result<u16, Self::Error> {
        let text = fs::read_to_string(&self.path).map_err(|source| HardwareError::Io {
            path: self.path.clone(),
            source,
        })?;

        let counts = text.trim().parse::<u16>().map_err(|_| HardwareError::Parse {
            path: self.path.clone(),
            value: text.trim().to_string(),
        })?;
        Ok(counts.min(ADC_MAX_COUNTS))
    }
}

/// Deterministic triangle wave between `low` and `high` counts
#[derive(Debug, Clone)]
pub struct SimulatedAdc {
    low: u16,
    high: u16,
    step: u16,
    current: u16,
    rising: bool,
}

impl SimulatedAdc {
    /// Wave between `low` and `high`, moving `step` counts per read
    pub fn new(low: u16, high: u16, step: u16) -> Self {
        let high = high.min(ADC_MAX_COUNTS);
        let low = low.min(high);
        Self {
            low,
            high,
            step: step.max(1),
            current: low,
            rising: true,
        }
    }

    /// Roughly 20-25 °C with the default correction
    pub fn room_temperature() -> Self {
        Self::new(78, 82, 1)
    }
}

impl AnalogSensor for SimulatedAdc {
    type Error = core::convert::Infallible;

    fn read_raw(&mut self) -> nb::Result<u16, Self::Error> {
        let value = self.current;
        if self.rising {
            self.current = self.current.saturating_add(self.step).min(self.high);
            self.rising = self.current < self.high;
        } else {
            self.current = self.current.saturating_sub(self.step).max(self.low);
            self.rising = self.current <= self.low;
        }
        Ok(value)
    }
}

/// LED driven through `/sys/class/leds/<name>/brightness`
#[derive(Debug, Clone)]
pub struct SysfsLed {
    brightness: PathBuf,
}

impl SysfsLed {
    /// LED by class name, e.g. `led0`
    pub fn named(name: &str) -> Self {
        Self::at(Path::new("/sys/class/leds").join(name).join("brightness"))
    }

    /// LED whose brightness attribute is at `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { brightness: path.into() }
    }
}

impl Indicator for SysfsLed {
    fn set(&mut self, on: bool) {
        let level = if on { "1" } else { "0" };
        if let Err(err) = fs::write(&self.brightness, level) {
            warn!("{}: {}", self.brightness.display(), err);
        }
    }
}

/// Indicator that logs each level change
#[derive(Debug, Clone, Copy, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) {
        info!("indicator {}", if on { "on" } else { "off" });
    }
}
