//! Network link for hosts
//!
//! A host has no radio to associate, but it can still tell "the network
//! path to the broker works" from "it does not". Association is a single
//! TCP connect to the broker address with a short timeout; the probe
//! connection is closed immediately.
//!
//! Name resolution and the connect both block, so each attempt runs on a
//! short-lived worker thread. `associate` starts the attempt and then
//! reports `WouldBlock` until the worker answers.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use log::debug;
use thermolink_core::{traits::NetworkLink, AgentConfig, LinkInfo};
use thiserror::Error;

/// Default probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(300);

/// Link probe errors
#[derive(Debug, Error)]
pub enum LinkError {
    /// Host name did not resolve
    #[error("cannot resolve {host}:{port}: {source}")]
    Resolve {
        /// Target host
        host: String,
        /// Target port
        port: u16,
        /// Resolver error
        source: std::io::Error,
    },

    /// Host name resolved to nothing
    #[error("{0} resolved to no addresses")]
    NoAddress(String),

    /// Probe connection failed
    #[error("probe to {addr} failed: {source}")]
    Probe {
        /// Address probed
        addr: SocketAddr,
        /// Connect error
        source: std::io::Error,
    },

    /// Worker thread could not be started
    #[error("cannot start link worker: {0}")]
    Spawn(std::io::Error),

    /// Worker thread exited without an answer
    #[error("link worker exited")]
    WorkerLost,
}

/// Link considered up while the broker address accepts TCP connections
#[derive(Debug)]
pub struct TcpProbeLink {
    network: String,
    host: String,
    port: u16,
    timeout: Duration,
    local_addr: Option<SocketAddr>,
    in_flight: Option<Receiver<Result<SocketAddr, LinkError>>>,
}

impl TcpProbeLink {
    /// Probe `host:port`; `network` is the label shown on the status page
    pub fn new(network: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            network: network.into(),
            host: host.into(),
            port,
            timeout: DEFAULT_PROBE_TIMEOUT,
            local_addr: None,
            in_flight: None,
        }
    }

    /// Probe the configured broker, labelled with the configured SSID
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.ssid.as_str(), config.mqtt_server.as_str(), config.mqtt_port)
    }

    /// Override the connect timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether an association attempt is running
    pub fn is_associating(&self) -> bool {
        self.in_flight.is_some()
    }

    fn start_attempt(&mut self) -> Result<(), LinkError> {
        let (tx, rx) = mpsc::channel();
        let host = self.host.clone();
        let port = self.port;
        let timeout = self.timeout;

        thread::Builder::new()
            .name("thermolink-link".into())
            .spawn(move || {
                let _ = tx.send(connect_once(&host, port, timeout));
            })
            .map_err(LinkError::Spawn)?;

        self.in_flight = Some(rx);
        Ok(())
    }
}

fn connect_once(host: &str, port: u16, timeout: Duration) -> Result<SocketAddr, LinkError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|source| LinkError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?
        .next()
        .ok_or_else(|| LinkError::NoAddress(host.to_string()))?;

    let stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|source| LinkError::Probe { addr, source })?;
    let local = stream
        .local_addr()
        .map_err(|source| LinkError::Probe { addr, source })?;
    debug!("broker {} reachable from {}", addr, local);
    Ok(local)
}

impl NetworkLink for TcpProbeLink {
    type Error = LinkError;

    fn associate(&mut self) -> nb::Result<(), Self::Error> {
        let Some(rx) = self.in_flight.as_ref() else {
            self.local_addr = None;
            self.start_attempt().map_err(nb::Error::Other)?;
            return Err(nb::Error::WouldBlock);
        };

        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return Err(nb::Error::WouldBlock),
            Err(TryRecvError::Disconnected) => Err(LinkError::WorkerLost),
        };
        self.in_flight = None;

        self.local_addr = Some(result.map_err(nb::Error::Other)?);
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.local_addr.is_some()
    }

    fn info(&self) -> LinkInfo {
        LinkInfo {
            network: self.network.clone(),
            address: self.local_addr.map(|addr| addr.ip().to_string()),
            hardware_address: None,
            signal_dbm: None,
        }
    }

    fn invalidate(&mut self) {
        self.local_addr = None;
        self.in_flight = None;
    }
}
