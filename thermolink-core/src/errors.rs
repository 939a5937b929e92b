//! Error Types for the Agent Core
//!
//! ## Error Categories
//!
//! The agent separates failures by how far they are allowed to travel:
//!
//! ### Fatal at start-up
//! - [`ConfigError`]: the config document is missing fields or invalid. The
//!   agent does not start in a degraded mode.
//! - [`AgentError`]: a collaborator was not supplied to the builder, or the
//!   calibration table could not be built.
//!
//! ### Rejected locally, never escalated
//! - [`PayloadError`]: an inbound calibration payload could not be decoded.
//!   The message is dropped and counted; the loop continues.
//!
//! ### Registry construction
//! - [`CalibrationError`]: the bounded channel table is full or a channel
//!   name exceeds the fixed capacity.
//!
//! Transient connectivity failures are not errors at this level at all:
//! the connectivity manager logs them and schedules a retry.

use alloc::string::String;

use thiserror_no_std::Error;

/// Result type for agent construction
pub type AgentResult<T> = Result<T, AgentError>;

/// Configuration document errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Document is not valid JSON or a required field is missing
    #[error("Config parse failed: {0}")]
    Parse(String),

    /// A field is present but its value cannot be used
    #[error("Invalid config field `{field}`: {reason}")]
    Invalid {
        /// JSON name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: &'static str,
    },
}

/// Calibration registry construction errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// All channel slots are taken
    #[error("Calibration registry full ({capacity} channels)")]
    RegistryFull {
        /// Number of slots in the registry
        capacity: usize,
    },

    /// Channel identifier does not fit the fixed-size key
    #[error("Channel name is {len} bytes, limit is {max}")]
    ChannelTooLong {
        /// Length of the rejected name
        len: usize,
        /// Maximum supported length
        max: usize,
    },
}

/// Inbound calibration payload errors - kept small, they are counted and dropped
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload bytes are not UTF-8
    #[error("Payload is not valid UTF-8")]
    NotUtf8,

    /// Payload is empty or whitespace
    #[error("Payload is empty")]
    Empty,

    /// Legacy numeric payload did not parse as a float
    #[error("Payload is not a number")]
    NotANumber,

    /// JSON payload is malformed or lacks a numeric `value`
    #[error("Payload is not a valid calibration document")]
    MalformedJson,
}

/// Agent construction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// Builder was not given a required collaborator
    #[error("Agent builder is missing the {0}")]
    MissingComponent(&'static str),

    /// Calibration table could not be built
    #[error("Calibration setup failed: {0}")]
    Calibration(#[from] CalibrationError),

    /// Configuration rejected
    #[error("Configuration rejected: {0}")]
    Config(#[from] ConfigError),
}
