//! Agent construction

use alloc::string::String;

use crate::{
    calibration::{CalibrationAction, CalibrationRegistry},
    config::{AgentConfig, DeviceTopics, TemperatureFormat},
    connectivity::{ConnectivityManager, RetryPolicy},
    constants::{
        DEFAULT_LINK_RETRY_MS, DEFAULT_OFFSET_C, DEFAULT_REFERENCE_VOLTAGE,
        DEFAULT_TELEMETRY_INTERVAL_MS,
    },
    correction::{AdcTransform, CorrectionModel},
    errors::{AgentError, AgentResult},
    scheduler::TelemetryScheduler,
    time::Timestamp,
    traits::{AnalogSensor, BrokerSession, Indicator, NetworkLink, NoIndicator},
};

use super::{Agent, AgentStats, BlinkSequence};

/// Builder for [`Agent`]
///
/// The device's own calibrate topic is registered with
/// [`CalibrationAction::SetOffset`] up front; [`register`](Self::register)
/// adds more channels or replaces that handler. Registration errors are
/// held until [`build`](Self::build).
pub struct AgentBuilder<L, S, A, I = NoIndicator> {
    topics: DeviceTopics,
    format: TemperatureFormat,
    transform: AdcTransform,
    initial_offset: f32,
    telemetry_interval_ms: u32,
    link_retry_ms: u32,
    session_retry: RetryPolicy,
    registry: CalibrationRegistry,
    link: Option<L>,
    session: Option<S>,
    sensor: Option<A>,
    indicator: I,
    error: Option<AgentError>,
}

impl<L, S, A> AgentBuilder<L, S, A, NoIndicator>
where
    L: NetworkLink,
    S: BrokerSession,
    A: AnalogSensor,
{
    /// Builder with default tuning for `topics`
    pub fn new(topics: DeviceTopics) -> Self {
        let mut builder = Self {
            topics,
            format: TemperatureFormat::default(),
            transform: AdcTransform::new(DEFAULT_REFERENCE_VOLTAGE),
            initial_offset: DEFAULT_OFFSET_C,
            telemetry_interval_ms: DEFAULT_TELEMETRY_INTERVAL_MS,
            link_retry_ms: DEFAULT_LINK_RETRY_MS,
            session_retry: RetryPolicy::default(),
            registry: CalibrationRegistry::new(),
            link: None,
            session: None,
            sensor: None,
            indicator: NoIndicator,
            error: None,
        };
        let own_channel = String::from(builder.topics.calibrate());
        builder.register_channel(own_channel, CalibrationAction::SetOffset);
        builder
    }

    /// Builder tuned from a validated config
    pub fn from_config(config: &AgentConfig) -> AgentResult<Self> {
        config.validate()?;
        let topics = config.topics()?;

        Ok(Self::new(topics)
            .temperature_format(config.temperature_format)
            .reference_voltage(config.reference_voltage)
            .initial_offset(config.initial_offset)
            .telemetry_interval(config.telemetry_interval_ms)
            .link_retry(config.link_retry_ms)
            .session_retry(RetryPolicy::from_limits(
                config.session_retry_ms,
                config.max_session_retry_ms,
            )))
    }
}

impl<L, S, A, I> AgentBuilder<L, S, A, I>
where
    L: NetworkLink,
    S: BrokerSession,
    A: AnalogSensor,
    I: Indicator,
{
    /// Network link
    pub fn link(mut self, link: L) -> Self {
        self.link = Some(link);
        self
    }

    /// Broker session
    pub fn session(mut self, session: S) -> Self {
        self.session = Some(session);
        self
    }

    /// Analog sensor
    pub fn sensor(mut self, sensor: A) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Indicator driven by blink requests
    pub fn indicator<J: Indicator>(self, indicator: J) -> AgentBuilder<L, S, A, J> {
        AgentBuilder {
            topics: self.topics,
            format: self.format,
            transform: self.transform,
            initial_offset: self.initial_offset,
            telemetry_interval_ms: self.telemetry_interval_ms,
            link_retry_ms: self.link_retry_ms,
            session_retry: self.session_retry,
            registry: self.registry,
            link: self.link,
            session: self.session,
            sensor: self.sensor,
            indicator,
            error: self.error,
        }
    }

    /// Telemetry temperature encoding
    pub fn temperature_format(mut self, format: TemperatureFormat) -> Self {
        self.format = format;
        self
    }

    /// ADC reference voltage
    pub fn reference_voltage(mut self, volts: f32) -> Self {
        self.transform = AdcTransform::new(volts);
        self
    }

    /// Offset in effect before any calibration arrives
    pub fn initial_offset(mut self, offset: f32) -> Self {
        self.initial_offset = offset;
        self
    }

    /// Telemetry interval
    pub fn telemetry_interval(mut self, interval_ms: u32) -> Self {
        self.telemetry_interval_ms = interval_ms;
        self
    }

    /// Delay between link association attempts
    pub fn link_retry(mut self, delay_ms: u32) -> Self {
        self.link_retry_ms = delay_ms;
        self
    }

    /// Broker handshake backoff
    pub fn session_retry(mut self, policy: RetryPolicy) -> Self {
        self.session_retry = policy;
        self
    }

    /// Route calibration values on `channel` to `action`
    pub fn register(mut self, channel: &str, action: CalibrationAction) -> Self {
        self.register_channel(channel.into(), action);
        self
    }

    fn register_channel(&mut self, channel: String, action: CalibrationAction) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.registry.register(&channel, action) {
            self.error = Some(err.into());
        }
    }

    /// Assemble the agent; `now` anchors uptime and the first telemetry slot
    pub fn build(self, now: Timestamp) -> AgentResult<Agent<L, S, A, I>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let link = self.link.ok_or(AgentError::MissingComponent("network link"))?;
        let session = self.session.ok_or(AgentError::MissingComponent("broker session"))?;
        let sensor = self.sensor.ok_or(AgentError::MissingComponent("analog sensor"))?;

        let connectivity = ConnectivityManager::new(link, session)
            .with_link_retry(self.link_retry_ms)
            .with_session_retry(self.session_retry);

        Ok(Agent {
            topics: self.topics,
            format: self.format,
            model: CorrectionModel::new(self.transform, self.initial_offset),
            registry: self.registry,
            connectivity,
            scheduler: TelemetryScheduler::new(self.telemetry_interval_ms, now),
            sensor,
            indicator: self.indicator,
            blink: BlinkSequence::new(),
            started_at: now,
            last_reading: None,
            pending_echo: None,
            stats: AgentStats::default(),
        })
    }
}
