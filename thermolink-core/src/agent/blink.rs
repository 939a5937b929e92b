//! Non-blocking indicator blink

use crate::{
    constants::BLINK_HALF_PERIOD_MS,
    time::{NotBefore, Timestamp},
    traits::Indicator,
};

/// Pending indicator toggles, advanced once per tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlinkSequence {
    remaining_toggles: u32,
    lit: bool,
    gate: NotBefore,
}

impl BlinkSequence {
    /// Idle sequence with the indicator off
    pub const fn new() -> Self {
        Self {
            remaining_toggles: 0,
            lit: false,
            gate: NotBefore::open(),
        }
    }

    /// Start `count` on/off cycles, replacing any sequence in progress
    ///
    /// The first toggle happens on the next `advance`. A sequence restarted
    /// while the indicator is lit gets one extra toggle so it still ends off.
    pub fn start(&mut self, now: Timestamp, count: u32) {
        self.remaining_toggles = count.saturating_mul(2).saturating_add(u32::from(self.lit));
        self.gate.arm(now, 0);
    }

    /// Toggle the indicator if a half period has passed
    pub fn advance<I: Indicator>(&mut self, now: Timestamp, indicator: &mut I) {
        if self.remaining_toggles == 0 || !self.gate.is_open(now) {
            return;
        }
        self.lit = !self.lit;
        indicator.set(self.lit);
        self.remaining_toggles -= 1;
        self.gate.arm(now, BLINK_HALF_PERIOD_MS);
    }

    /// True while toggles are pending
    pub fn is_active(&self) -> bool {
        self.remaining_toggles > 0
    }

    /// Last level written to the indicator
    pub fn is_lit(&self) -> bool {
        self.lit
    }
}
