//! Sensor and indicator selection for the host binary

use std::path::Path;

use thermolink_connectors::{HardwareError, IioAdc, LogIndicator, SimulatedAdc, SysfsLed};
use thermolink_core::traits::{AnalogSensor, Indicator};

/// Sensor picked from the command line
pub enum HostAdc {
    Iio(IioAdc),
    Simulated(SimulatedAdc),
}

impl HostAdc {
    pub fn iio(path: &Path) -> Self {
        Self::Iio(IioAdc::new(path))
    }

    pub fn simulated() -> Self {
        Self::Simulated(SimulatedAdc::room_temperature())
    }
}

impl AnalogSensor for HostAdc {
    type Error = HardwareError;

    fn read_raw(&mut self) -> nb::Result<u16, Self::Error> {
        match self {
            Self::Iio(adc) => adc.read_raw(),
            Self::Simulated(adc) => adc.read_raw().map_err(|err| match err {
                nb::Error::WouldBlock => nb::Error::WouldBlock,
                nb::Error::Other(never) => match never {},
            }),
        }
    }
}

/// Indicator picked from the command line
pub enum HostIndicator {
    Led(SysfsLed),
    Log(LogIndicator),
}

impl HostIndicator {
    pub fn led(name: &str) -> Self {
        Self::Led(SysfsLed::named(name))
    }

    pub fn log() -> Self {
        Self::Log(LogIndicator)
    }
}

impl Indicator for HostIndicator {
    fn set(&mut self, on: bool) {
        match self {
            Self::Led(led) => led.set(on),
            Self::Log(log) => log.set(on),
        }
    }
}
