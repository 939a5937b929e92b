//! Channel-keyed calibration dispatch
//!
//! The registry maps a channel identifier (the calibrate topic, or the
//! channel an HTTP request resolves to) to a [`CalibrationAction`]. It is
//! filled once at start-up and only read afterwards.
//!
//! Storage is a fixed-capacity `heapless::Vec`, so dispatch never
//! allocates and is safe to call from inside the broker poll callback.
//!
//! ```rust
//! use thermolink_core::{CalibrationAction, CalibrationRegistry, CorrectionModel, DispatchOutcome};
//!
//! let mut registry = CalibrationRegistry::new();
//! registry.register("lab/probe/calibrate", CalibrationAction::SetOffset).unwrap();
//!
//! let mut model = CorrectionModel::default();
//! assert_eq!(registry.dispatch("lab/probe/calibrate", 1.5, &mut model), DispatchOutcome::Applied);
//! assert_eq!(registry.dispatch("lab/other/calibrate", 9.0, &mut model), DispatchOutcome::Unmapped);
//! assert_eq!(model.offset(), 1.5);
//! ```

use heapless::{String, Vec};

use crate::{
    constants::{MAX_CHANNELS, MAX_CHANNEL_LEN},
    correction::CorrectionModel,
    errors::CalibrationError,
};

/// Fixed-capacity channel identifier
pub type ChannelName = String<MAX_CHANNEL_LEN>;

/// Build a [`ChannelName`], rejecting names longer than the key capacity
pub fn channel_name(channel: &str) -> Result<ChannelName, CalibrationError> {
    let mut name = ChannelName::new();
    name.push_str(channel).map_err(|_| CalibrationError::ChannelTooLong {
        len: channel.len(),
        max: MAX_CHANNEL_LEN,
    })?;
    Ok(name)
}

/// What a calibration value does when it arrives on a channel
#[derive(Debug, Clone, Copy)]
pub enum CalibrationAction {
    /// Replace the correction offset with the received value
    SetOffset,
    /// Board-specific handler
    Custom(fn(&mut CorrectionModel, f32)),
}

impl CalibrationAction {
    /// Run the action against the model
    #[inline]
    pub fn apply(&self, model: &mut CorrectionModel, value: f32) {
        match self {
            Self::SetOffset => model.set_offset(value),
            Self::Custom(handler) => handler(model, value),
        }
    }
}

/// Result of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran
    Applied,
    /// No handler for the channel; nothing changed
    Unmapped,
}

/// Channel → action table
#[derive(Debug, Clone, Default)]
pub struct CalibrationRegistry {
    entries: Vec<(ChannelName, CalibrationAction), MAX_CHANNELS>,
}

impl CalibrationRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Register `action` for `channel`
    ///
    /// Registering an existing channel replaces its action and returns the
    /// previous one.
    pub fn register(
        &mut self,
        channel: &str,
        action: CalibrationAction,
    ) -> Result<Option<CalibrationAction>, CalibrationError> {
        let name = channel_name(channel)?;

        if let Some(slot) = self.entries.iter_mut().find(|(key, _)| key.as_str() == channel) {
            let previous = core::mem::replace(&mut slot.1, action);
            return Ok(Some(previous));
        }

        self.entries
            .push((name, action))
            .map_err(|_| CalibrationError::RegistryFull { capacity: MAX_CHANNELS })?;
        Ok(None)
    }

    /// Route `value` to the handler registered for `channel`
    ///
    /// Unknown channels are a logged no-op.
    pub fn dispatch(&self, channel: &str, value: f32, model: &mut CorrectionModel) -> DispatchOutcome {
        match self.lookup(channel) {
            Some(action) => {
                action.apply(model, value);
                log_info!("calibration on [{}] applied value {}", channel, value);
                DispatchOutcome::Applied
            }
            None => {
                log_warn!("calibration on unmapped channel [{}] ignored", channel);
                DispatchOutcome::Unmapped
            }
        }
    }

    /// Action registered for `channel`, if any
    pub fn lookup(&self, channel: &str) -> Option<&CalibrationAction> {
        self.entries
            .iter()
            .find(|(key, _)| key.as_str() == channel)
            .map(|(_, action)| action)
    }

    /// Whether `channel` has a handler
    pub fn contains(&self, channel: &str) -> bool {
        self.lookup(channel).is_some()
    }

    /// Every registered channel, used to re-subscribe after a reconnect
    pub fn channels(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
