//! MQTT broker session
//!
//! Wraps `rumqttc`'s synchronous client. The agent owns reconnection, so
//! this session never lets `rumqttc` reconnect on its own: any connection
//! error marks the session closed and `close` drops the client. The next
//! `open` builds a fresh one, and the connectivity manager re-subscribes
//! every registered channel after it.
//!
//! Nothing here blocks the agent loop for long:
//! - `open` hands the connect to a worker thread and returns; `handshake`
//!   reports `WouldBlock` until the worker has the CONNACK, or an error
//!   once `handshake_timeout` has passed
//! - `poll` waits at most `poll_timeout` per event and handles at most
//!   `max_events_per_poll` events
//! - a SUBACK refusing a channel closes the session
//!
//! Telemetry and calibration mirrors are published at QoS 0, not retained.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rumqttc::{
    Client, ConnectReturnCode, Connection, Event, MqttOptions, Packet, QoS, RecvTimeoutError,
    SubscribeReasonCode, Transport,
};
use thermolink_core::{
    constants::time::DEFAULT_KEEP_ALIVE_SECS, traits::BrokerSession, AgentConfig,
};
use thiserror::Error;

/// MQTT session errors
#[derive(Debug, Error)]
pub enum MqttError {
    /// Operation needs an open session
    #[error("Not connected")]
    NotConnected,

    /// No CONNACK within the handshake timeout
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Broker answered the CONNECT with a failure code
    #[error("Broker refused connection: {0:?}")]
    Refused(ConnectReturnCode),

    /// Transport or protocol failure
    #[error("Connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    /// Request could not be queued to the event loop
    #[error("Client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// Broker refused one of the subscriptions
    #[error("Subscription refused (packet {0})")]
    SubscribeRefused(u16),

    /// Handshake worker could not be started
    #[error("Cannot start handshake worker: {0}")]
    Spawn(std::io::Error),

    /// Event loop is gone
    #[error("Event loop disconnected")]
    Disconnected,
}

type Handshake = Result<(Client, Connection), MqttError>;

/// Broker connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    /// Broker host
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Client id presented to the broker
    pub client_id: String,
    /// User name; credentials are sent only when non-empty
    pub username: String,
    /// Password
    pub password: String,
    /// Keep-alive interval
    pub keep_alive: Duration,
    /// Connect over TLS with the platform's default roots
    pub tls: bool,
    /// Upper bound on waiting for the CONNACK
    pub handshake_timeout: Duration,
    /// Upper bound on waiting for each event in `poll`
    pub poll_timeout: Duration,
    /// Events handled per `poll` at most
    pub max_events_per_poll: usize,
    /// Request queue capacity between client and event loop
    pub capacity: usize,
}

impl MqttConfig {
    /// Defaults for `host:port` and `client_id`
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            username: String::new(),
            password: String::new(),
            keep_alive: Duration::from_secs(u64::from(DEFAULT_KEEP_ALIVE_SECS)),
            tls: false,
            handshake_timeout: Duration::from_secs(3),
            poll_timeout: Duration::from_millis(2),
            max_events_per_poll: 16,
            capacity: 10,
        }
    }

    /// Settings taken from the agent config
    pub fn from_agent_config(config: &AgentConfig) -> Self {
        let mut mqtt = Self::new(config.mqtt_server.as_str(), config.mqtt_port, config.client_id());
        mqtt.username = config.mqtt_user.clone();
        mqtt.password = config.mqtt_password.clone();
        mqtt.keep_alive = Duration::from_secs(u64::from(config.keep_alive_secs));
        mqtt.tls = config.tls;
        mqtt
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.as_str(), self.host.as_str(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if !self.username.is_empty() {
            options.set_credentials(self.username.as_str(), self.password.as_str());
        }
        if self.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }
}

/// [`BrokerSession`] backed by a `rumqttc` client
pub struct MqttSession {
    config: MqttConfig,
    client: Option<Client>,
    connection: Option<Connection>,
    pending: Option<Receiver<Handshake>>,
    open: bool,
}

impl MqttSession {
    /// Closed session; nothing connects until `open`
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            client: None,
            connection: None,
            pending: None,
            open: false,
        }
    }

    /// Session settings
    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    fn client(&self) -> Result<&Client, MqttError> {
        match (&self.client, self.open) {
            (Some(client), true) => Ok(client),
            _ => Err(MqttError::NotConnected),
        }
    }

    fn await_connack(connection: &mut Connection, timeout: Duration) -> Result<(), MqttError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(MqttError::HandshakeTimeout(timeout));
            }

            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    return match ack.code {
                        ConnectReturnCode::Success => Ok(()),
                        code => Err(MqttError::Refused(code)),
                    };
                }
                Ok(Ok(event)) => debug!("mqtt handshake event: {:?}", event),
                Ok(Err(err)) => return Err(err.into()),
                Err(RecvTimeoutError::Timeout) => return Err(MqttError::HandshakeTimeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(MqttError::Disconnected),
            }
        }
    }
}

impl BrokerSession for MqttSession {
    type Error = MqttError;

    fn open(&mut self) -> Result<(), Self::Error> {
        self.close();

        let (tx, rx) = mpsc::channel();
        let options = self.config.options();
        let capacity = self.config.capacity;
        let timeout = self.config.handshake_timeout;

        thread::Builder::new()
            .name("thermolink-mqtt-connect".into())
            .spawn(move || {
                let (client, mut connection) = Client::new(options, capacity);
                let result = Self::await_connack(&mut connection, timeout).map(|()| (client, connection));
                // Nobody is waiting if the session was closed meanwhile.
                let _ = tx.send(result);
            })
            .map_err(MqttError::Spawn)?;

        self.pending = Some(rx);
        Ok(())
    }

    fn handshake(&mut self) -> nb::Result<(), Self::Error> {
        let Some(rx) = self.pending.as_ref() else {
            return if self.open {
                Ok(())
            } else {
                Err(nb::Error::Other(MqttError::NotConnected))
            };
        };

        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return Err(nb::Error::WouldBlock),
            Err(TryRecvError::Disconnected) => Err(MqttError::Disconnected),
        };
        self.pending = None;

        let (client, connection) = result.map_err(nb::Error::Other)?;
        debug!("mqtt session established with {}:{}", self.config.host, self.config.port);
        self.client = Some(client);
        self.connection = Some(connection);
        self.open = true;
        Ok(())
    }

    fn subscribe(&mut self, channel: &str) -> Result<(), Self::Error> {
        self.client()?.try_subscribe(channel, QoS::AtMostOnce)?;
        Ok(())
    }

    fn publish(&mut self, channel: &str, payload: &[u8]) -> Result<(), Self::Error> {
        self.client()?
            .try_publish(channel, QoS::AtMostOnce, false, payload.to_vec())?;
        Ok(())
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) -> Result<(), Self::Error> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(MqttError::NotConnected);
        };

        for _ in 0..self.config.max_events_per_poll {
            match connection.recv_timeout(self.config.poll_timeout) {
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    on_message(&publish.topic, &publish.payload);
                }
                Ok(Ok(Event::Incoming(Packet::SubAck(ack)))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        warn!("broker refused subscription (packet {})", ack.pkid);
                        self.open = false;
                        return Err(MqttError::SubscribeRefused(ack.pkid));
                    }
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    warn!("broker sent DISCONNECT");
                    self.open = false;
                    return Ok(());
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    self.open = false;
                    return Err(err.into());
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    self.open = false;
                    return Err(MqttError::Disconnected);
                }
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if self.open {
                let _ = client.try_disconnect();
            }
        }
        self.connection = None;
        self.pending = None;
        self.open = false;
    }
}
