//! Playback clock - virtual time position driving decode lookup
//!
//! A clock only moves forward while advanced by the primary. Every other
//! change is an explicit jump back to its loop target (loop wrap, load,
//! swap) or a copy of the primary's value on a replica.

use crate::role::PrimaryAuthority;

/// Monotonic virtual time position, always >= 0
///
/// The loop target (where `reset` jumps to) is a parameter rather than a
/// hardcoded 0: video clocks restart at 0, while the dataset clock cycles
/// through a year range that starts at a non-zero value.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackClock {
    value: f64,
    loop_target: f64,
    rate: f64,
    wrap_at: Option<f64>,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    /// Clock at 0 advancing at real time with loop target 0
    pub fn new() -> Self {
        Self {
            value: 0.0,
            loop_target: 0.0,
            rate: 1.0,
            wrap_at: None,
        }
    }

    /// Set where `reset` jumps to; the clock starts there
    pub fn with_loop_target(mut self, target: f64) -> Self {
        self.loop_target = sanitize(target);
        self.value = self.loop_target;
        self
    }

    /// Scale applied to `dt` on every advance
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        self
    }

    /// Self-wrapping clock: reaching `end` jumps back to the loop target
    ///
    /// Used by clocks with no decoder to report end of stream.
    pub fn with_wrap(mut self, end: f64) -> Self {
        self.wrap_at = (end.is_finite() && end > self.loop_target).then_some(end);
        self
    }

    /// Current position
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn loop_target(&self) -> f64 {
        self.loop_target
    }

    /// Advance by one frame's `dt` (primary only)
    ///
    /// Negative or non-finite `dt` is ignored. Returns true when a
    /// self-wrapping clock wrapped during this advance.
    pub fn advance(&mut self, dt: f64, _authority: PrimaryAuthority) -> bool {
        if !dt.is_finite() || dt <= 0.0 {
            return false;
        }
        self.value += dt * self.rate;
        match self.wrap_at {
            Some(end) if self.value >= end => {
                self.value = self.loop_target;
                true
            }
            _ => false,
        }
    }

    /// Jump back to the loop target (load, loop wrap, swap)
    pub fn reset(&mut self) {
        self.value = self.loop_target;
    }

    /// Take over another clock's accumulated position (clock-transfer swap)
    pub fn transfer_from(&mut self, other: &PlaybackClock) {
        self.value = other.value;
    }

    /// Copy in the value carried by a received snapshot (replica side)
    ///
    /// No advancing happens here; the value arrives already advanced.
    pub fn sync(&mut self, value: f64) {
        self.value = sanitize(value);
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
