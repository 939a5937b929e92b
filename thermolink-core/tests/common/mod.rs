//! Scripted collaborators for agent integration tests
//!
//! Every mock is fully deterministic: links and sessions follow a queue of
//! scripted results, the ADC returns a fixed count, and the control surface
//! is a plain queue. Tests drive time explicitly.

#![allow(dead_code)]

use std::collections::VecDeque;

use thermolink_core::{
    agent::{ControlRequest, StatusSnapshot},
    traits::{AnalogSensor, BrokerSession, ControlSurface, Indicator, LinkInfo, NetworkLink},
    Agent, AgentBuilder, DeviceTopics,
};

pub const CALIBRATE: &str = "dev_test/termometer/calibrate";
pub const STATUS: &str = "dev_test/termometer/status";

/// Link that associates unless a failure is scripted
#[derive(Debug, Default)]
pub struct MockLink {
    pub failures: VecDeque<&'static str>,
    pub up: bool,
    pub attempts: u32,
}

impl MockLink {
    pub fn failing(times: usize) -> Self {
        Self {
            failures: std::iter::repeat("no carrier").take(times).collect(),
            ..Self::default()
        }
    }

    pub fn drop_carrier(&mut self) {
        self.up = false;
    }
}

impl NetworkLink for MockLink {
    type Error = &'static str;

    fn associate(&mut self) -> nb::Result<(), Self::Error> {
        self.attempts += 1;
        match self.failures.pop_front() {
            Some(err) => {
                self.up = false;
                Err(nb::Error::Other(err))
            }
            None => {
                self.up = true;
                Ok(())
            }
        }
    }

    fn is_up(&self) -> bool {
        self.up
    }

    fn invalidate(&mut self) {
        self.up = false;
    }

    fn info(&self) -> LinkInfo {
        LinkInfo {
            network: "lab-wifi".into(),
            address: self.up.then(|| "192.168.1.40".into()),
            hardware_address: Some("5c:cf:7f:00:00:01".into()),
            signal_dbm: Some(-61),
        }
    }
}

/// Broker session recording everything the agent does with it
#[derive(Debug, Default)]
pub struct MockSession {
    pub open_failures: VecDeque<&'static str>,
    /// Handshake polls answered with `WouldBlock` after each `open`
    pub handshake_ticks: u32,
    pub handshake_pending: u32,
    pub open: bool,
    pub opens: u32,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
    pub inbound: VecDeque<(String, Vec<u8>)>,
    pub drop_on_next_poll: bool,
}

impl MockSession {
    pub fn refusing(times: usize) -> Self {
        Self {
            open_failures: std::iter::repeat("connection refused").take(times).collect(),
            ..Self::default()
        }
    }

    pub fn slow(handshake_ticks: u32) -> Self {
        Self {
            handshake_ticks,
            ..Self::default()
        }
    }

    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back((topic.to_string(), payload.to_vec()));
    }

    pub fn published_on(&self, topic: &str) -> Vec<&[u8]> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.as_slice())
            .collect()
    }
}

impl BrokerSession for MockSession {
    type Error = &'static str;

    fn open(&mut self) -> Result<(), Self::Error> {
        self.opens += 1;
        self.open = false;
        match self.open_failures.pop_front() {
            Some(err) => Err(err),
            None => {
                self.handshake_pending = self.handshake_ticks;
                Ok(())
            }
        }
    }

    fn handshake(&mut self) -> nb::Result<(), Self::Error> {
        if self.handshake_pending > 0 {
            self.handshake_pending -= 1;
            return Err(nb::Error::WouldBlock);
        }
        self.open = true;
        Ok(())
    }

    fn subscribe(&mut self, channel: &str) -> Result<(), Self::Error> {
        self.subscriptions.push(channel.to_string());
        Ok(())
    }

    fn publish(&mut self, channel: &str, payload: &[u8]) -> Result<(), Self::Error> {
        self.published.push((channel.to_string(), payload.to_vec()));
        Ok(())
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) -> Result<(), Self::Error> {
        if std::mem::take(&mut self.drop_on_next_poll) {
            self.open = false;
            return Err("connection reset");
        }
        while let Some((topic, payload)) = self.inbound.pop_front() {
            on_message(&topic, &payload);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// ADC stuck on one count
#[derive(Debug, Clone, Copy)]
pub struct FixedAdc(pub u16);

impl AnalogSensor for FixedAdc {
    type Error = &'static str;

    fn read_raw(&mut self) -> nb::Result<u16, Self::Error> {
        Ok(self.0)
    }
}

/// Indicator that records every level written
#[derive(Debug, Default)]
pub struct RecordingIndicator(pub Vec<bool>);

impl Indicator for RecordingIndicator {
    fn set(&mut self, on: bool) {
        self.0.push(on);
    }
}

/// Control surface backed by a queue; status replies are collected
#[derive(Debug, Default)]
pub struct QueuedControl {
    pub requests: VecDeque<ControlRequest>,
    pub replies: Vec<StatusSnapshot>,
}

impl QueuedControl {
    pub fn push(&mut self, request: ControlRequest) {
        self.requests.push_back(request);
    }
}

impl ControlSurface for QueuedControl {
    type Ticket = ();

    fn next_request(&mut self) -> Option<(ControlRequest, Self::Ticket)> {
        self.requests.pop_front().map(|request| (request, ()))
    }

    fn reply_status(&mut self, _ticket: Self::Ticket, status: StatusSnapshot) {
        self.replies.push(status);
    }
}

pub type TestAgent = Agent<MockLink, MockSession, FixedAdc, RecordingIndicator>;

pub fn topics() -> DeviceTopics {
    DeviceTopics::new("dev_test", "termometer").unwrap()
}

pub fn builder() -> AgentBuilder<MockLink, MockSession, FixedAdc, RecordingIndicator> {
    AgentBuilder::new(topics())
        .link(MockLink::default())
        .session(MockSession::default())
        .sensor(FixedAdc(512))
        .indicator(RecordingIndicator::default())
}

pub fn agent() -> TestAgent {
    builder().build(0).unwrap()
}

/// Tick every `step` ms over `[from, to]`, returning the number of publishes
pub fn run(agent: &mut TestAgent, control: &mut QueuedControl, from: u32, to: u32, step: u32) -> u32 {
    let mut published = 0;
    let mut now = from;
    while now <= to {
        published += agent.tick(now, control).published as u32;
        now += step;
    }
    published
}
