//! Network and broker connectivity state machine
//!
//! ## States
//!
//! ```text
//!                associate() ok              handshake ok + subscribe-all
//! Disconnected ─────────────────▶ LinkUp ─────────────────────────────▶ SessionUp
//!      ▲   │ fail: retry after         │ fail: retry after backoff          │
//!      │   └── link delay              │                                    │
//!      │                               ◀──── poll() error / broker close ───┘
//!      ├───────────── link reports down (from LinkUp or SessionUp) ─────────┘
//!      └───────────── repeated handshake failures: link invalidated
//! ```
//!
//! ## Non-blocking retries
//!
//! [`ConnectivityManager::ensure_connected`] advances at most one step per
//! call. Failed attempts arm a [`NotBefore`] gate instead of sleeping, so
//! telemetry sampling and control requests keep running while the agent is
//! offline. Association and the broker handshake may span several ticks:
//! while either reports `WouldBlock` the manager stays where it is and asks
//! again on the next call.
//!
//! After [`RELINK_AFTER_SESSION_FAILURES`] handshakes fail in a row the
//! link is invalidated and re-associated, so a broker that vanished behind
//! a healthy-looking link is eventually noticed at the link layer too.
//!
//! ## Subscriptions
//!
//! Subscriptions are not persisted by the session. Every transition into
//! `SessionUp` re-subscribes to every channel handed in by the caller; if
//! any subscription cannot be queued the handshake counts as failed.
//! Acknowledgements arrive later: a session that sees a refused
//! subscription closes itself and the next tick starts over.

use core::fmt;

use serde::Serialize;

use crate::{
    constants::{
        time::{DEFAULT_LINK_RETRY_MS, DEFAULT_SESSION_RETRY_MS},
        RELINK_AFTER_SESSION_FAILURES,
    },
    time::{NotBefore, Timestamp},
    traits::{BrokerSession, NetworkLink},
};

/// Connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConnectionState {
    /// No usable network transport
    #[default]
    Disconnected,
    /// Transport usable, no broker session
    LinkUp,
    /// Session authenticated; a subscription request for every calibration
    /// channel has been queued
    SessionUp,
}

impl ConnectionState {
    /// Short label for logs and the status page
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::LinkUp => "link up",
            Self::SessionUp => "session up",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delay policy between broker handshake attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Same delay after every failure
    Constant {
        /// Delay in milliseconds
        delay_ms: u32,
    },
    /// Doubling delay, capped
    Exponential {
        /// Delay after the first failure
        base_ms: u32,
        /// Upper bound
        max_ms: u32,
    },
}

impl RetryPolicy {
    /// Delay after `failures` consecutive failures (0 = first failure)
    pub fn delay_for(&self, failures: u32) -> u32 {
        match *self {
            Self::Constant { delay_ms } => delay_ms,
            Self::Exponential { base_ms, max_ms } => {
                let factor = 1u32 << failures.min(16);
                base_ms.saturating_mul(factor).min(max_ms)
            }
        }
    }

    /// Constant policy when `max_ms` is absent, exponential otherwise
    pub fn from_limits(base_ms: u32, max_ms: Option<u32>) -> Self {
        match max_ms {
            Some(max_ms) if max_ms > base_ms => Self::Exponential { base_ms, max_ms },
            _ => Self::Constant { delay_ms: base_ms },
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Constant { delay_ms: DEFAULT_SESSION_RETRY_MS }
    }
}

/// Connection statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    /// Messages handed to an open session
    pub published: u32,
    /// Publishes dropped because no session was up
    pub dropped: u32,
    /// Publishes the session refused
    pub publish_failures: u32,
    /// Successful transitions into `SessionUp`
    pub sessions_opened: u32,
    /// Sessions lost after being established
    pub sessions_lost: u32,
    /// Failed link association attempts
    pub link_failures: u32,
    /// Failed broker handshakes
    pub session_failures: u32,
    /// Links invalidated after repeated handshake failures
    pub relinks: u32,
}

/// Owns the link and session and walks them toward `SessionUp`
pub struct ConnectivityManager<L: NetworkLink, S: BrokerSession> {
    link: L,
    session: S,
    state: ConnectionState,
    gate: NotBefore,
    link_retry_ms: u32,
    session_policy: RetryPolicy,
    relink_after: u32,
    consecutive_session_failures: u32,
    handshaking: bool,
    stats: ConnectionStats,
}

impl<L: NetworkLink, S: BrokerSession> ConnectivityManager<L, S> {
    /// Manager starting `Disconnected` with default delays
    pub fn new(link: L, session: S) -> Self {
        Self {
            link,
            session,
            state: ConnectionState::Disconnected,
            gate: NotBefore::open(),
            link_retry_ms: DEFAULT_LINK_RETRY_MS,
            session_policy: RetryPolicy::default(),
            relink_after: RELINK_AFTER_SESSION_FAILURES,
            consecutive_session_failures: 0,
            handshaking: false,
            stats: ConnectionStats::default(),
        }
    }

    /// Delay between link association attempts
    pub fn with_link_retry(mut self, delay_ms: u32) -> Self {
        self.link_retry_ms = delay_ms;
        self
    }

    /// Policy between broker handshake attempts
    pub fn with_session_retry(mut self, policy: RetryPolicy) -> Self {
        self.session_policy = policy;
        self
    }

    /// Consecutive handshake failures before the link is re-associated
    ///
    /// `0` never invalidates the link.
    pub fn with_relink_after(mut self, failures: u32) -> Self {
        self.relink_after = failures;
        self
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True only in `SessionUp`
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::SessionUp
    }

    /// Counters since start-up
    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// Whether a broker handshake is in flight
    pub fn is_handshaking(&self) -> bool {
        self.handshaking
    }

    /// Milliseconds until the next connection attempt is allowed
    pub fn retry_in(&self, now: Timestamp) -> u32 {
        match self.state {
            ConnectionState::SessionUp => 0,
            _ => self.gate.remaining(now),
        }
    }

    /// The network link
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Mutable access to the network link
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// The broker session
    pub fn session(&self) -> &S {
        &self.session
    }

    /// Mutable access to the broker session
    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Advance toward `SessionUp`, or do housekeeping if already there
    ///
    /// `channels` is consulted only when a session is established; inbound
    /// messages are delivered to `on_message` during housekeeping.
    pub fn ensure_connected<'c, I>(
        &mut self,
        now: Timestamp,
        channels: I,
        on_message: &mut dyn FnMut(&str, &[u8]),
    ) -> ConnectionState
    where
        I: IntoIterator<Item = &'c str>,
    {
        match self.state {
            ConnectionState::SessionUp => self.service_session(on_message),
            ConnectionState::LinkUp => {
                if !self.link.is_up() {
                    self.abandon_handshake();
                    self.link_lost();
                } else if self.handshaking {
                    self.await_handshake(now, channels);
                } else if self.gate.is_open(now) {
                    self.open_session(now, channels);
                }
            }
            ConnectionState::Disconnected => {
                if self.gate.is_open(now) {
                    self.associate(now);
                }
            }
        }
        self.state
    }

    /// Best-effort publish; dropped unless `SessionUp`
    ///
    /// Returns whether the session accepted the message. Nothing is queued
    /// or retried.
    pub fn publish(&mut self, channel: &str, payload: &[u8]) -> bool {
        if !self.is_connected() {
            self.stats.dropped = self.stats.dropped.wrapping_add(1);
            log_debug!("publish to [{}] dropped: {}", channel, self.state);
            return false;
        }

        match self.session.publish(channel, payload) {
            Ok(()) => {
                self.stats.published = self.stats.published.wrapping_add(1);
                true
            }
            Err(err) => {
                self.stats.publish_failures = self.stats.publish_failures.wrapping_add(1);
                log_warn!("publish to [{}] failed: {}", channel, err);
                false
            }
        }
    }

    fn associate(&mut self, now: Timestamp) {
        match self.link.associate() {
            Err(nb::Error::WouldBlock) => {}
            Ok(()) => {
                let info = self.link.info();
                log_info!(
                    "link up on {} ({})",
                    info.network,
                    info.address.as_deref().unwrap_or("no address")
                );
                self.gate.release();
                self.transition(ConnectionState::LinkUp);
            }
            Err(nb::Error::Other(err)) => {
                self.stats.link_failures = self.stats.link_failures.wrapping_add(1);
                log_warn!("link association failed: {}, retrying in {} ms", err, self.link_retry_ms);
                self.gate.arm(now, self.link_retry_ms);
            }
        }
    }

    fn open_session<'c, I>(&mut self, now: Timestamp, channels: I)
    where
        I: IntoIterator<Item = &'c str>,
    {
        log_info!("attempting broker connection");
        if let Err(err) = self.session.open() {
            log_warn!("broker handshake failed: {}", err);
            self.session_failed(now);
            return;
        }

        self.handshaking = true;
        self.await_handshake(now, channels);
    }

    fn await_handshake<'c, I>(&mut self, now: Timestamp, channels: I)
    where
        I: IntoIterator<Item = &'c str>,
    {
        match self.session.handshake() {
            Err(nb::Error::WouldBlock) => return,
            Err(nb::Error::Other(err)) => {
                log_warn!("broker handshake failed: {}", err);
                self.abandon_handshake();
                self.session_failed(now);
                return;
            }
            Ok(()) => self.handshaking = false,
        }

        for channel in channels {
            if let Err(err) = self.session.subscribe(channel) {
                log_warn!("subscribe to [{}] failed: {}", channel, err);
                self.session.close();
                self.session_failed(now);
                return;
            }
            log_info!("subscribed to [{}]", channel);
        }

        self.consecutive_session_failures = 0;
        self.stats.sessions_opened = self.stats.sessions_opened.wrapping_add(1);
        self.transition(ConnectionState::SessionUp);
    }

    fn session_failed(&mut self, now: Timestamp) {
        let delay = self.session_policy.delay_for(self.consecutive_session_failures);
        self.consecutive_session_failures = self.consecutive_session_failures.saturating_add(1);
        self.stats.session_failures = self.stats.session_failures.wrapping_add(1);
        self.gate.arm(now, delay);

        if self.relink_after > 0 && self.consecutive_session_failures % self.relink_after == 0 {
            log_warn!(
                "{} broker handshakes failed, re-associating link in {} ms",
                self.consecutive_session_failures,
                delay
            );
            self.stats.relinks = self.stats.relinks.wrapping_add(1);
            self.link.invalidate();
            self.transition(ConnectionState::Disconnected);
        } else {
            log_warn!("retrying broker connection in {} ms", delay);
        }
    }

    fn abandon_handshake(&mut self) {
        if core::mem::take(&mut self.handshaking) {
            self.session.close();
        }
    }

    fn service_session(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        if !self.link.is_up() {
            self.session.close();
            self.link_lost();
            return;
        }

        let lost = match self.session.poll(on_message) {
            Ok(()) => !self.session.is_open(),
            Err(err) => {
                log_warn!("broker session error: {}", err);
                true
            }
        };

        if lost {
            self.session.close();
            self.stats.sessions_lost = self.stats.sessions_lost.wrapping_add(1);
            // Reconnect on the very next tick.
            self.gate.release();
            self.transition(ConnectionState::LinkUp);
        }
    }

    fn link_lost(&mut self) {
        self.gate.release();
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            log_info!("connectivity: {} -> {}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::LinkInfo;
    use alloc::{
        collections::VecDeque,
        string::{String, ToString},
        vec::Vec,
    };

    #[derive(Default)]
    struct ScriptedLink {
        results: VecDeque<nb::Result<(), &'static str>>,
        up: bool,
        attempts: u32,
        invalidations: u32,
    }

    impl NetworkLink for ScriptedLink {
        type Error = &'static str;

        fn associate(&mut self) -> nb::Result<(), Self::Error> {
            self.attempts += 1;
            let result = self.results.pop_front().unwrap_or(Ok(()));
            self.up = result.is_ok();
            result
        }

        fn invalidate(&mut self) {
            self.invalidations += 1;
            self.up = false;
        }

        fn is_up(&self) -> bool {
            self.up
        }

        fn info(&self) -> LinkInfo {
            LinkInfo { network: "lab".to_string(), ..LinkInfo::default() }
        }
    }

    #[derive(Default)]
    struct ScriptedSession {
        open_results: VecDeque<Result<(), &'static str>>,
        handshake_results: VecDeque<nb::Result<(), &'static str>>,
        open: bool,
        opens: u32,
        subscriptions: Vec<String>,
        published: Vec<(String, Vec<u8>)>,
        inbound: VecDeque<(String, Vec<u8>)>,
        fail_next_poll: bool,
    }

    impl BrokerSession for ScriptedSession {
        type Error = &'static str;

        fn open(&mut self) -> Result<(), Self::Error> {
            self.opens += 1;
            self.open = false;
            self.open_results.pop_front().unwrap_or(Ok(()))
        }

        fn handshake(&mut self) -> nb::Result<(), Self::Error> {
            let result = self.handshake_results.pop_front().unwrap_or(Ok(()));
            self.open = result.is_ok();
            result
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
            if core::mem::take(&mut self.fail_next_poll) {
                self.open = false;
                return Err("keepalive missed");
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

    const CHANNELS: [&str; 2] = ["dev/a/calibrate", "dev/b/calibrate"];

    fn step(manager: &mut ConnectivityManager<ScriptedLink, ScriptedSession>, now: Timestamp) -> ConnectionState {
        manager.ensure_connected(now, CHANNELS, &mut |_, _| {})
    }

    #[test]
    fn one_step_per_tick_to_session_up() {
        let mut manager = ConnectivityManager::new(ScriptedLink::default(), ScriptedSession::default());

        assert_eq!(step(&mut manager, 0), ConnectionState::LinkUp);
        assert_eq!(step(&mut manager, 1), ConnectionState::SessionUp);
        assert!(manager.is_connected());
        assert_eq!(manager.session().subscriptions, CHANNELS);
        assert_eq!(manager.stats().sessions_opened, 1);
    }

    #[test]
    fn link_failure_waits_for_link_delay() {
        let link = ScriptedLink {
            results: VecDeque::from([Err(nb::Error::Other("no carrier"))]),
            ..Default::default()
        };
        let mut manager = ConnectivityManager::new(link, ScriptedSession::default()).with_link_retry(500);

        assert_eq!(step(&mut manager, 1000), ConnectionState::Disconnected);
        assert_eq!(step(&mut manager, 1200), ConnectionState::Disconnected);
        assert_eq!(manager.link().attempts, 1);
        assert_eq!(manager.retry_in(1200), 300);

        assert_eq!(step(&mut manager, 1500), ConnectionState::LinkUp);
        assert_eq!(manager.link().attempts, 2);
        assert_eq!(manager.stats().link_failures, 1);
    }

    #[test]
    fn handshake_failure_stays_link_up_with_constant_backoff() {
        let session = ScriptedSession {
            open_results: VecDeque::from([Err("bad credentials"), Err("bad credentials")]),
            ..Default::default()
        };
        let mut manager = ConnectivityManager::new(ScriptedLink::default(), session)
            .with_session_retry(RetryPolicy::Constant { delay_ms: 5000 });

        step(&mut manager, 0);
        assert_eq!(step(&mut manager, 10), ConnectionState::LinkUp);
        assert_eq!(manager.session().opens, 1);

        // Gate closed: no second attempt before 5 s
        assert_eq!(step(&mut manager, 5009), ConnectionState::LinkUp);
        assert_eq!(manager.session().opens, 1);

        assert_eq!(step(&mut manager, 5010), ConnectionState::LinkUp);
        assert_eq!(manager.session().opens, 2);

        assert_eq!(step(&mut manager, 10_010), ConnectionState::SessionUp);
        assert_eq!(manager.stats().session_failures, 2);
    }

    #[test]
    fn exponential_policy_doubles_up_to_cap() {
        let policy = RetryPolicy::Exponential { base_ms: 1000, max_ms: 5000 };
        assert_eq!(policy.delay_for(0), 1000);
        assert_eq!(policy.delay_for(1), 2000);
        assert_eq!(policy.delay_for(2), 4000);
        assert_eq!(policy.delay_for(3), 5000);
        assert_eq!(policy.delay_for(40), 5000);

        assert_eq!(RetryPolicy::from_limits(5000, None), RetryPolicy::Constant { delay_ms: 5000 });
        assert_eq!(
            RetryPolicy::from_limits(500, Some(8000)),
            RetryPolicy::Exponential { base_ms: 500, max_ms: 8000 }
        );
    }

    #[test]
    fn lost_session_reconnects_and_resubscribes_next_tick() {
        let mut manager = ConnectivityManager::new(ScriptedLink::default(), ScriptedSession::default());
        step(&mut manager, 0);
        step(&mut manager, 1);

        manager.session_mut().fail_next_poll = true;
        assert_eq!(step(&mut manager, 2), ConnectionState::LinkUp);
        assert_eq!(manager.stats().sessions_lost, 1);

        assert_eq!(step(&mut manager, 3), ConnectionState::SessionUp);
        assert_eq!(manager.session().subscriptions.len(), 4);
        assert_eq!(manager.stats().sessions_opened, 2);
    }

    #[test]
    fn link_down_drops_to_disconnected() {
        let mut manager = ConnectivityManager::new(ScriptedLink::default(), ScriptedSession::default());
        step(&mut manager, 0);
        step(&mut manager, 1);

        manager.link.up = false;
        assert_eq!(step(&mut manager, 2), ConnectionState::Disconnected);
        assert!(!manager.session().is_open());
    }

    #[test]
    fn publish_is_dropped_unless_session_up() {
        let mut manager = ConnectivityManager::new(ScriptedLink::default(), ScriptedSession::default());

        assert!(!manager.publish("dev/a/status", b"{}"));
        assert_eq!(manager.stats().dropped, 1);

        step(&mut manager, 0);
        step(&mut manager, 1);
        assert!(manager.publish("dev/a/status", b"{}"));
        assert_eq!(manager.session().published.len(), 1);
        assert_eq!(manager.stats().published, 1);
    }

    #[test]
    fn inbound_messages_reach_callback_during_housekeeping() {
        let mut manager = ConnectivityManager::new(ScriptedLink::default(), ScriptedSession::default());
        step(&mut manager, 0);
        step(&mut manager, 1);
        manager.session_mut().inbound.push_back(("dev/a/calibrate".to_string(), b"1.5".to_vec()));

        let mut seen = Vec::new();
        manager.ensure_connected(2, CHANNELS, &mut |topic, payload| {
            seen.push((topic.to_string(), payload.to_vec()));
        });

        assert_eq!(seen, [("dev/a/calibrate".to_string(), b"1.5".to_vec())]);
    }

    #[test]
    fn retry_gate_survives_clock_wrap() {
        let link = ScriptedLink {
            results: VecDeque::from([Err(nb::Error::Other("no carrier"))]),
            ..Default::default()
        };
        let mut manager = ConnectivityManager::new(link, ScriptedSession::default()).with_link_retry(500);

        step(&mut manager, u32::MAX - 100);
        assert_eq!(step(&mut manager, 200), ConnectionState::Disconnected);
        assert_eq!(step(&mut manager, 399), ConnectionState::LinkUp);
    }

    #[test]
    fn association_in_flight_is_polled_without_counting_failures() {
        let link = ScriptedLink {
            results: VecDeque::from([Err(nb::Error::WouldBlock), Err(nb::Error::WouldBlock)]),
            ..Default::default()
        };
        let mut manager = ConnectivityManager::new(link, ScriptedSession::default());

        assert_eq!(step(&mut manager, 0), ConnectionState::Disconnected);
        assert_eq!(step(&mut manager, 1), ConnectionState::Disconnected);
        assert_eq!(step(&mut manager, 2), ConnectionState::LinkUp);
        assert_eq!(manager.link().attempts, 3);
        assert_eq!(manager.stats().link_failures, 0);
    }

    #[test]
    fn pending_handshake_spans_ticks_before_subscribing() {
        let session = ScriptedSession {
            handshake_results: VecDeque::from([Err(nb::Error::WouldBlock), Err(nb::Error::WouldBlock)]),
            ..Default::default()
        };
        let mut manager = ConnectivityManager::new(ScriptedLink::default(), session);
        step(&mut manager, 0);

        assert_eq!(step(&mut manager, 1), ConnectionState::LinkUp);
        assert!(manager.is_handshaking());
        assert!(manager.session().subscriptions.is_empty());

        assert_eq!(step(&mut manager, 2), ConnectionState::LinkUp);
        assert_eq!(manager.session().opens, 1);

        assert_eq!(step(&mut manager, 3), ConnectionState::SessionUp);
        assert!(!manager.is_handshaking());
        assert_eq!(manager.session().opens, 1);
        assert_eq!(manager.session().subscriptions, CHANNELS);
    }

    #[test]
    fn handshake_error_after_waiting_backs_off() {
        let session = ScriptedSession {
            handshake_results: VecDeque::from([Err(nb::Error::WouldBlock), Err(nb::Error::Other("no connack"))]),
            ..Default::default()
        };
        let mut manager = ConnectivityManager::new(ScriptedLink::default(), session)
            .with_session_retry(RetryPolicy::Constant { delay_ms: 5000 });
        step(&mut manager, 0);
        step(&mut manager, 10);

        assert_eq!(step(&mut manager, 20), ConnectionState::LinkUp);
        assert!(!manager.is_handshaking());
        assert_eq!(manager.stats().session_failures, 1);
        assert_eq!(manager.retry_in(20), 5000);

        assert_eq!(step(&mut manager, 5020), ConnectionState::SessionUp);
        assert_eq!(manager.session().opens, 2);
    }

    #[test]
    fn link_loss_mid_handshake_abandons_it() {
        let session = ScriptedSession {
            handshake_results: VecDeque::from([Err(nb::Error::WouldBlock)]),
            ..Default::default()
        };
        let mut manager = ConnectivityManager::new(ScriptedLink::default(), session);
        step(&mut manager, 0);
        step(&mut manager, 1);
        assert!(manager.is_handshaking());

        manager.link.up = false;
        assert_eq!(step(&mut manager, 2), ConnectionState::Disconnected);
        assert!(!manager.is_handshaking());
    }

    #[test]
    fn repeated_handshake_failures_reassociate_link() {
        let session = ScriptedSession {
            open_results: VecDeque::from([Err("timeout"), Err("timeout"), Err("timeout")]),
            ..Default::default()
        };
        let mut manager = ConnectivityManager::new(ScriptedLink::default(), session)
            .with_session_retry(RetryPolicy::Constant { delay_ms: 100 })
            .with_relink_after(3);

        step(&mut manager, 0);
        assert_eq!(step(&mut manager, 1), ConnectionState::LinkUp);
        assert_eq!(step(&mut manager, 101), ConnectionState::LinkUp);
        assert_eq!(step(&mut manager, 201), ConnectionState::Disconnected);
        assert_eq!(manager.link().invalidations, 1);
        assert_eq!(manager.stats().relinks, 1);

        // Re-association waits for the same backoff, then proceeds.
        assert_eq!(step(&mut manager, 250), ConnectionState::Disconnected);
        assert_eq!(manager.link().attempts, 1);
        assert_eq!(step(&mut manager, 301), ConnectionState::LinkUp);
        assert_eq!(manager.link().attempts, 2);
        assert_eq!(step(&mut manager, 302), ConnectionState::SessionUp);
    }

    #[test]
    fn relink_can_be_disabled() {
        let session = ScriptedSession {
            open_results: VecDeque::from([Err("timeout"); 4]),
            ..Default::default()
        };
        let mut manager = ConnectivityManager::new(ScriptedLink::default(), session)
            .with_session_retry(RetryPolicy::Constant { delay_ms: 10 })
            .with_relink_after(0);

        step(&mut manager, 0);
        for now in [1, 11, 21, 31] {
            assert_eq!(step(&mut manager, now), ConnectionState::LinkUp);
        }
        assert_eq!(manager.link().invalidations, 0);
        assert_eq!(manager.stats().session_failures, 4);
    }
}
