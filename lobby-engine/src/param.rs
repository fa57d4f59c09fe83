//! Timestamped parameter automation.
//!
//! An `AudioParam` holds an intrinsic value plus a time-ordered list of
//! events. Reading the value at time `t`:
//! - events at or before `t` have been reached; the latest one sets the value
//! - the first event after `t` decides what happens in between: a `SetValue`
//!   waits (the previous value holds), a ramp interpolates from the previous
//!   event towards its own value
//! - exponential ramps between values of opposite sign or through zero hold
//!   the previous value
//!
//! Events are never applied relative to "now"; that is what lets the
//! control side run late without moving a note.

use lobby_core::dsp::{exp_interp, lerp};
use lobby_core::envelopes::{Breakpoint, Segment};

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Automation {
    SetValue { value: f32, at: f64 },
    LinearRamp { value: f32, until: f64 },
    ExponentialRamp { value: f32, until: f64 },
}

impl Automation {
    #[inline]
    pub fn time(&self) -> f64 {
        match *self {
            Automation::SetValue { at, .. } => at,
            Automation::LinearRamp { until, .. } | Automation::ExponentialRamp { until, .. } => until,
        }
    }

    #[inline]
    pub fn value(&self) -> f32 {
        match *self {
            Automation::SetValue { value, .. }
            | Automation::LinearRamp { value, .. }
            | Automation::ExponentialRamp { value, .. } => value,
        }
    }
}

impl From<Breakpoint> for Automation {
    fn from(bp: Breakpoint) -> Self {
        match bp.segment {
            Segment::Set => Automation::SetValue { value: bp.value, at: bp.time },
            Segment::Linear => Automation::LinearRamp { value: bp.value, until: bp.time },
            Segment::Exponential => Automation::ExponentialRamp { value: bp.value, until: bp.time },
        }
    }
}

#[derive(Clone, Debug)]
pub struct AudioParam {
    value: f32,
    events: Vec<Automation>,
}

impl AudioParam {
    pub fn new(value: f32) -> Self {
        Self { value, events: Vec::new() }
    }

    /// Insert keeping time order; equal times keep insertion order.
    pub fn schedule(&mut self, event: Automation) {
        let t = event.time();
        let at = self.events.partition_point(|e| e.time() <= t);
        self.events.insert(at, event);
    }

    pub fn cancel_from(&mut self, from: f64) {
        self.events.retain(|e| e.time() < from);
    }

    /// Immediate set: drops all automation.
    pub fn set(&mut self, value: f32) {
        self.events.clear();
        self.value = value;
    }

    pub fn value_at(&self, t: f64) -> f32 {
        let mut prev_t = 0.0f64;
        let mut prev_v = self.value;
        for ev in &self.events {
            let ev_t = ev.time();
            if ev_t <= t {
                prev_t = ev_t;
                prev_v = ev.value();
                continue;
            }
            let span = ev_t - prev_t;
            let frac = if span > 0.0 { ((t - prev_t) / span).clamp(0.0, 1.0) as f32 } else { 1.0 };
            return match *ev {
                Automation::SetValue { .. } => prev_v,
                Automation::LinearRamp { value, .. } => lerp(prev_v, value, frac),
                Automation::ExponentialRamp { value, .. } => exp_interp(prev_v, value, frac),
            };
        }
        prev_v
    }

    /// Forget events that can no longer influence `value_at(t')` for any
    /// `t' >= t`. The last reached event stays as the anchor of the next ramp.
    pub fn prune(&mut self, t: f64) {
        let reached = self.events.partition_point(|e| e.time() <= t);
        if reached > 1 {
            self.value = self.events[reached - 1].value();
            self.events.drain(..reached - 1);
        }
    }

    #[inline]
    pub fn is_automated(&self) -> bool {
        !self.events.is_empty()
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

// ------------------------------------ Tests --------------------------------------
