//! Envelope shapes expressed as absolute-time breakpoints.
//!
//! The engine never advances envelopes per sample on the control side. A voice
//! is described by where its curve must be at which instant, and those
//! breakpoints are handed to the renderer as parameter automation. Anchoring at
//! absolute timestamps is what keeps notes immune to control-timer jitter.
//!
//! Provided shapes:
//! - `ExpEnvelope` : floor → peak → floor, both segments exponential
//! - `ExpGlide`    : one exponential segment (used for FM depth decay)

/// Near-zero level exponential segments start from and return to.
/// Exponential ramps cannot touch 0.0.
pub const FLOOR: f32 = 0.0001;

/// Interpolation used to reach a breakpoint from the previous one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Jump to the value at the breakpoint time.
    Set,
    Linear,
    Exponential,
}

/// One point of an automation curve, relative or absolute depending on use.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Breakpoint {
    pub value: f32,
    pub time: f64,
    pub segment: Segment,
}

/// Two-stage exponential attack/release envelope.
///
/// `attack` is the time from the note start to the peak; `end` is the time
/// from the note start at which the curve is back at the floor. The release
/// therefore lasts `end - attack`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ExpEnvelope {
    pub floor: f32,
    pub peak: f32,
    pub attack: f64,
    pub end: f64,
}

impl ExpEnvelope {
    /// Envelope from `FLOOR` to `peak` and back.
    pub fn new(peak: f32, attack: f64, end: f64) -> Self {
        let attack = attack.max(0.0);
        Self { floor: FLOOR, peak: peak.max(FLOOR), attack, end: end.max(attack) }
    }

    /// Breakpoints anchored at the absolute time `start`.
    pub fn breakpoints(&self, start: f64) -> [Breakpoint; 3] {
        [
            Breakpoint { value: self.floor, time: start, segment: Segment::Set },
            Breakpoint { value: self.peak, time: start + self.attack, segment: Segment::Exponential },
            Breakpoint { value: self.floor, time: start + self.end, segment: Segment::Exponential },
        ]
    }
}

/// Single exponential move from `from` to `to` over `duration` seconds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ExpGlide {
    pub from: f32,
    pub to: f32,
    pub duration: f64,
}

impl ExpGlide {
    pub fn new(from: f32, to: f32, duration: f64) -> Self {
        Self { from, to, duration: duration.max(0.0) }
    }

    pub fn breakpoints(&self, start: f64) -> [Breakpoint; 2] {
        [
            Breakpoint { value: self.from, time: start, segment: Segment::Set },
            Breakpoint { value: self.to, time: start + self.duration, segment: Segment::Exponential },
        ]
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints_are_absolute() {
        let env = ExpEnvelope::new(0.06, 0.002, 0.06);
        let [a, b, c] = env.breakpoints(10.0);
        assert_eq!(a, Breakpoint { value: FLOOR, time: 10.0, segment: Segment::Set });
        assert!((b.time - 10.002).abs() < 1e-12);
        assert_eq!(b.value, 0.06);
        assert_eq!(b.segment, Segment::Exponential);
        assert!((c.time - 10.06).abs() < 1e-12);
        assert_eq!(c.value, FLOOR);
        assert_eq!(c.segment, Segment::Exponential);
    }

    #[test]
    fn envelope_never_ends_before_its_peak() {
        let env = ExpEnvelope::new(0.0, 0.5, 0.1);
        assert_eq!(env.peak, FLOOR);
        assert_eq!(env.end, 0.5);
        let [_, peak, end] = env.breakpoints(1.0);
        assert!(end.time >= peak.time);

        let env = ExpEnvelope::new(0.1, -1.0, 0.3);
        assert_eq!(env.attack, 0.0);
    }

    #[test]
    fn glide_sets_then_ramps() {
        let glide = ExpGlide::new(120.0, 8.0, 0.25);
        let [a, b] = glide.breakpoints(2.0);
        assert_eq!(a, Breakpoint { value: 120.0, time: 2.0, segment: Segment::Set });
        assert_eq!(b, Breakpoint { value: 8.0, time: 2.25, segment: Segment::Exponential });
        assert_eq!(ExpGlide::new(1.0, 2.0, -3.0).duration, 0.0);
    }
}
