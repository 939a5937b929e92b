//! The cooperative agent loop
//!
//! [`Agent::tick`] is the single entry point. The host calls it over and
//! over; each call does a bounded amount of work and returns:
//!
//! 1. drain up to [`MAX_CONTROL_REQUESTS_PER_TICK`] control requests and
//!    advance the blink diagnostic
//! 2. `ensure_connected` - one connectivity step, or housekeeping that
//!    delivers inbound calibration messages to the registry
//! 3. telemetry - sample when due, publish if the session is up
//!
//! All state (correction offset, registry, connection) is owned here and
//! only touched from inside `tick`, so no locking is needed.
//!
//! ```rust,ignore
//! let clock = MonotonicTime::new();
//! let mut agent = AgentBuilder::from_config(&config)?
//!     .link(link)
//!     .session(session)
//!     .sensor(adc)
//!     .build(clock.now())?;
//!
//! loop {
//!     agent.tick(clock.now(), &mut control);
//! }
//! ```

mod blink;
mod builder;
mod status;

use alloc::string::String;

pub use blink::BlinkSequence;
pub use builder::AgentBuilder;
pub use status::{AgentStats, StatusSnapshot};

use crate::{
    calibration::{CalibrationRegistry, DispatchOutcome},
    config::{DeviceTopics, TemperatureFormat},
    connectivity::{ConnectionState, ConnectivityManager},
    constants::MAX_CONTROL_REQUESTS_PER_TICK,
    correction::CorrectionModel,
    scheduler::{SensorReading, TelemetryScheduler},
    time::{elapsed_ms, Timestamp},
    traits::{AnalogSensor, BrokerSession, ControlSurface, Indicator, NetworkLink, NoIndicator},
    wire::{self, TelemetryMessage},
};

/// Request queued by a control front-end
#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequest {
    /// Dispatch a calibration value on `channel`
    Calibrate {
        /// Resolved calibration channel
        channel: String,
        /// Value to dispatch
        value: f32,
        /// Also publish the value on `channel` when the session is up
        mirror: bool,
    },
    /// Toggle the indicator `count` times
    Blink {
        /// Number of on/off cycles
        count: u32,
    },
    /// Reply with a [`StatusSnapshot`]
    Status,
}

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Connectivity state after step 2
    pub state: ConnectionState,
    /// Reading taken in step 3, if a slot was due
    pub reading: Option<SensorReading>,
    /// Whether that reading was handed to the session
    pub published: bool,
    /// Control requests serviced in step 1
    pub control_requests: usize,
}

/// Connected sensor agent
pub struct Agent<L, S, A, I = NoIndicator>
where
    L: NetworkLink,
    S: BrokerSession,
    A: AnalogSensor,
    I: Indicator,
{
    topics: DeviceTopics,
    format: TemperatureFormat,
    model: CorrectionModel,
    registry: CalibrationRegistry,
    connectivity: ConnectivityManager<L, S>,
    scheduler: TelemetryScheduler,
    sensor: A,
    indicator: I,
    blink: BlinkSequence,
    started_at: Timestamp,
    last_reading: Option<SensorReading>,
    pending_echo: Option<MirroredValue>,
    stats: AgentStats,
}

/// Calibration this agent published on a channel it may itself subscribe to
///
/// The broker hands such a mirror straight back; the first matching inbound
/// value is dropped instead of being dispatched a second time.
#[derive(Debug, Clone, PartialEq)]
struct MirroredValue {
    channel: String,
    value: f32,
}

impl MirroredValue {
    fn matches(&self, channel: &str, value: f32) -> bool {
        self.channel == channel
            && (self.value.to_bits() == value.to_bits() || (self.value.is_nan() && value.is_nan()))
    }
}

impl<L, S, A, I> Agent<L, S, A, I>
where
    L: NetworkLink,
    S: BrokerSession,
    A: AnalogSensor,
    I: Indicator,
{
    /// Run one iteration of the loop
    pub fn tick<C: ControlSurface>(&mut self, now: Timestamp, control: &mut C) -> TickReport {
        // 1. control surface and diagnostics
        let control_requests = self.service_control(now, control);
        self.blink.advance(now, &mut self.indicator);

        // 2. connectivity
        let state = {
            let Self {
                connectivity,
                registry,
                model,
                stats,
                topics,
                pending_echo,
                ..
            } = self;
            let registry = &*registry;
            let device_id = topics.device_id();
            connectivity.ensure_connected(now, registry.channels(), &mut |channel, payload| {
                handle_inbound(registry, model, stats, pending_echo, device_id, channel, payload);
            })
        };
        if state != ConnectionState::SessionUp {
            // A mirror published on a lost session never comes back.
            self.pending_echo = None;
        }

        // 3. telemetry
        let reading = self.scheduler.tick(now, &mut self.sensor, &self.model);
        let mut published = false;
        if let Some(reading) = reading {
            self.last_reading = Some(reading);
            self.stats.readings_taken = self.stats.readings_taken.wrapping_add(1);
            if self.connectivity.is_connected() {
                published = self.publish_reading(&reading);
            } else {
                self.stats.telemetry_skipped = self.stats.telemetry_skipped.wrapping_add(1);
            }
        }

        TickReport {
            state,
            reading,
            published,
            control_requests,
        }
    }

    /// Dispatch a calibration value from a non-broker ingress
    ///
    /// With `mirror`, the value is also published (legacy numeric form) on
    /// `channel` so other subscribers see it. Mirroring happens whether or
    /// not this agent has a handler for the channel; when it does, the echo
    /// the broker sends back is not dispatched again.
    pub fn calibrate(&mut self, channel: &str, value: f32, mirror: bool) -> DispatchOutcome {
        let outcome = self.registry.dispatch(channel, value, &mut self.model);
        self.stats.record_dispatch(outcome);

        if mirror && self.connectivity.is_connected() {
            let payload = wire::encode_calibration(value);
            if self.connectivity.publish(channel, payload.as_bytes())
                && self.registry.contains(channel)
            {
                self.pending_echo = Some(MirroredValue {
                    channel: String::from(channel),
                    value,
                });
            }
        }
        outcome
    }

    /// Current state for the status surface
    ///
    /// Takes a fresh sample; falls back to the last telemetry reading when
    /// the converter is busy or failing.
    pub fn status(&mut self, now: Timestamp) -> StatusSnapshot {
        let fresh = SensorReading::take(&mut self.sensor, &self.model, now).ok();
        let reading = fresh.or(self.last_reading);

        StatusSnapshot {
            device_id: String::from(self.topics.device_id()),
            version: crate::VERSION,
            uptime_secs: elapsed_ms(now, self.started_at) / 1000,
            state: self.connectivity.state(),
            link: self.connectivity.link().info(),
            offset: self.model.offset(),
            temperature: reading.map(|r| r.corrected),
            raw: reading.map(|r| r.raw),
            last_telemetry: self.last_reading,
            retry_in_ms: self.connectivity.retry_in(now),
            connection: self.connectivity.stats(),
            agent: self.stats,
        }
    }

    /// Correction model
    pub fn model(&self) -> &CorrectionModel {
        &self.model
    }

    /// Calibration registry
    pub fn registry(&self) -> &CalibrationRegistry {
        &self.registry
    }

    /// Connectivity manager
    pub fn connectivity(&self) -> &ConnectivityManager<L, S> {
        &self.connectivity
    }

    /// Mutable connectivity manager, for hosts that need to reach the session
    pub fn connectivity_mut(&mut self) -> &mut ConnectivityManager<L, S> {
        &mut self.connectivity
    }

    /// Device topics
    pub fn topics(&self) -> &DeviceTopics {
        &self.topics
    }

    /// Telemetry scheduler
    pub fn scheduler(&self) -> &TelemetryScheduler {
        &self.scheduler
    }

    /// Agent counters
    pub fn stats(&self) -> AgentStats {
        self.stats
    }

    /// Indicator driven by the blink diagnostic
    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    fn service_control<C: ControlSurface>(&mut self, now: Timestamp, control: &mut C) -> usize {
        let mut handled = 0;
        while handled < MAX_CONTROL_REQUESTS_PER_TICK {
            let Some((request, ticket)) = control.next_request() else {
                break;
            };
            handled += 1;

            match request {
                ControlRequest::Calibrate { channel, value, mirror } => {
                    self.calibrate(&channel, value, mirror);
                }
                ControlRequest::Blink { count } => {
                    log_info!("blinking indicator {} times", count);
                    self.blink.start(now, count);
                }
                ControlRequest::Status => {
                    let status = self.status(now);
                    control.reply_status(ticket, status);
                }
            }
        }
        self.stats.control_requests = self.stats.control_requests.wrapping_add(handled as u32);
        handled
    }

    fn publish_reading(&mut self, reading: &SensorReading) -> bool {
        let message = TelemetryMessage::new(self.topics.device_id(), reading.corrected, self.format);
        let payload = message.encode();
        let published = self.connectivity.publish(self.topics.status(), &payload);
        if published {
            self.stats.telemetry_sent = self.stats.telemetry_sent.wrapping_add(1);
            log_debug!(
                "message published to topic [{}] : {}",
                self.topics.status(),
                core::str::from_utf8(&payload).unwrap_or("<binary>")
            );
        }
        published
    }
}

/// Broker ingress: decode, then route through the registry
fn handle_inbound(
    registry: &CalibrationRegistry,
    model: &mut CorrectionModel,
    stats: &mut AgentStats,
    pending_echo: &mut Option<MirroredValue>,
    device_id: &str,
    channel: &str,
    payload: &[u8],
) {
    match wire::decode_calibration(payload, device_id) {
        Ok(Some(value)) if pending_echo.as_ref().is_some_and(|echo| echo.matches(channel, value)) => {
            log_debug!("own calibration mirror on [{}] skipped", channel);
            *pending_echo = None;
            stats.mirrors_echoed = stats.mirrors_echoed.wrapping_add(1);
        }
        Ok(Some(value)) => {
            let outcome = registry.dispatch(channel, value, model);
            stats.record_dispatch(outcome);
        }
        Ok(None) => {
            log_debug!("calibration on [{}] addressed to another device", channel);
            stats.commands_ignored = stats.commands_ignored.wrapping_add(1);
        }
        Err(err) => {
            log_warn!("rejected payload on [{}]: {}", channel, err);
            stats.payloads_rejected = stats.payloads_rejected.wrapping_add(1);
        }
    }
}
