//! Network link and broker session abstractions
//!
//! The connectivity manager drives two layers:
//!
//! ```text
//! ┌──────────────────┐   associate()   ┌──────────────────┐
//! │   NetworkLink    │ ──────────────▶ │  transport usable │
//! └──────────────────┘                 └─────────┬────────┘
//!                                                │ open(), handshake()*,
//!                                                │ subscribe()
//!                                                ▼
//! ┌──────────────────┐     poll()      ┌──────────────────┐
//! │  BrokerSession   │ ◀─────────────▶ │ inbound messages │
//! └──────────────────┘                 └──────────────────┘
//! ```
//!
//! Every call must return promptly. Work that waits on the network (a
//! Wi-Fi join, DNS, a TCP connect, the CONNACK) is started by one call and
//! reported through `nb::Error::WouldBlock` until it finishes; the manager
//! asks again on the next tick.

use alloc::string::String;
use core::fmt::Display;

use serde::Serialize;

/// Description of the current link, shown on the status page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInfo {
    /// Network name (SSID on wireless boards)
    pub network: String,
    /// Local address once associated
    pub address: Option<String>,
    /// Hardware address, if the platform exposes it
    pub hardware_address: Option<String>,
    /// Received signal strength in dBm, if known
    pub signal_dbm: Option<i32>,
}

/// Network association (Wi-Fi join, route check, ...)
pub trait NetworkLink {
    /// Association failure
    type Error: Display;

    /// Start or continue one association attempt
    ///
    /// `WouldBlock` while the attempt is still in flight.
    fn associate(&mut self) -> nb::Result<(), Self::Error>;

    /// Whether the transport is still usable
    ///
    /// Returning `false` after a successful association is the explicit
    /// link-down signal that drops the manager back to `Disconnected`.
    fn is_up(&self) -> bool;

    /// Current link description
    fn info(&self) -> LinkInfo;

    /// Forget the association; `is_up` is false until the next `associate`
    ///
    /// Called when the broker stays unreachable over an apparently healthy
    /// link.
    fn invalidate(&mut self);
}

/// Authenticated publish/subscribe session with a broker
pub trait BrokerSession {
    /// Session failure
    type Error: Display;

    /// Start the broker handshake with the configured credentials
    ///
    /// Must not wait for the broker's answer; see [`handshake`](Self::handshake).
    fn open(&mut self) -> Result<(), Self::Error>;

    /// Outcome of the handshake started by `open`
    ///
    /// `WouldBlock` while the broker has not answered. Implementations
    /// enforce their own handshake timeout and report it as an error.
    fn handshake(&mut self) -> nb::Result<(), Self::Error>;

    /// Subscribe to a calibration channel on the open session
    ///
    /// The request is queued; the broker's acknowledgement is not awaited.
    /// A session that learns of a refused subscription reports itself
    /// closed, which sends the manager through a fresh handshake.
    fn subscribe(&mut self, channel: &str) -> Result<(), Self::Error>;

    /// Fire-and-forget publish
    fn publish(&mut self, channel: &str, payload: &[u8]) -> Result<(), Self::Error>;

    /// Protocol housekeeping (keep-alive, inbound delivery)
    ///
    /// Inbound messages are handed to `on_message` synchronously. An error
    /// means the session is gone.
    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) -> Result<(), Self::Error>;

    /// Whether the session is still established
    fn is_open(&self) -> bool;

    /// Drop the session; subscriptions are not kept
    fn close(&mut self);
}
