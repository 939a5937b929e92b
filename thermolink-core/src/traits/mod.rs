//! Collaborator Traits for the Agent Loop
//!
//! The core never talks to hardware, sockets or HTTP directly. Each outside
//! concern sits behind a narrow trait, and the loop is generic over them:
//!
//! - [`link`] - network link and broker session (connectivity)
//! - [`sensor`] - analog input and diagnostic indicator (hardware)
//! - [`control`] - the status/control surface serviced in step 1 of a tick
//!
//! ## Design Philosophy
//!
//! - **Non-blocking**: every method returns promptly; waiting is expressed
//!   as a retry on a later tick (`nb::Error::WouldBlock`, not-before gates)
//! - **Static dispatch**: the agent is monomorphized over its collaborators
//! - **Testable**: scripted implementations drive every state transition
//!   without a network

pub mod control;
pub mod link;
pub mod sensor;

pub use control::{ControlSurface, NoControl};
pub use link::{BrokerSession, LinkInfo, NetworkLink};
pub use sensor::{AnalogSensor, Indicator, NoIndicator};
