//! The seam between the music core and whatever renders audio.
//!
//! The core never touches samples. It creates small node graphs, wires them
//! into the output bus and attaches timestamped automation; a context turns
//! those descriptions into sound on its own clock. Two contexts ship with the
//! crate: [`OfflineContext`](crate::offline::OfflineContext) renders on the
//! caller's thread, [`RealtimeContext`](crate::realtime::RealtimeContext)
//! forwards everything to a device callback.

use std::fmt;
use std::sync::Arc;

use lobby_core::envelopes::Breakpoint;
use lobby_core::filters::Response;
use rand::Rng;
use thiserror::Error;

use crate::param::Automation;

/// Handle to a node inside a context's graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Every context's final output node.
    pub const DESTINATION: NodeId = NodeId(0);
}

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wave {
    Sine,
    Square,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
}

impl FilterKind {
    pub(crate) fn response(self) -> Response {
        match self {
            FilterKind::Lowpass => Response::Lowpass,
            FilterKind::Highpass => Response::Highpass,
            FilterKind::Bandpass => Response::Bandpass,
        }
    }
}

/// Automatable parameter of a node.
///
/// Tones expose `Frequency`, gains expose `Gain`, filters expose `Frequency`
/// and `Q`. Automation aimed at a parameter a node does not have is ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Gain,
    Frequency,
    Q,
}

/// Activation state of a context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ContextState {
    Suspended = 0,
    Running = 1,
    Closed = 2,
}

impl ContextState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => ContextState::Running,
            2 => ContextState::Closed,
            _ => ContextState::Suspended,
        }
    }
}

/// Why a `resume()` request did not bring the context up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResumeError {
    /// Output is held back until the user interacts with the host.
    #[error("audio output is blocked until a user gesture")]
    Blocked,
    /// The context was closed and can never run again.
    #[error("audio context is closed")]
    Closed,
}

/// Immutable block of noise shared by every percussion voice.
#[derive(Clone)]
pub struct NoiseBuffer(Arc<[f32]>);

impl NoiseBuffer {
    /// Uniform white noise in [-1, 1).
    pub fn white<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        let samples: Vec<f32> = (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        Self(samples.into())
    }

    pub fn from_samples(samples: Vec<f32>) -> Self {
        Self(samples.into())
    }

    #[inline] pub fn len(&self) -> usize { self.0.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.0.is_empty() }
    #[inline] pub fn samples(&self) -> &[f32] { &self.0 }
}

impl fmt::Debug for NoiseBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NoiseBuffer").field(&self.0.len()).finish()
    }
}

/// A rendering engine the music core can drive.
///
/// All times are absolute seconds on the context's own clock (`now()`).
/// Implementations must never block.
pub trait AudioContext {
    fn sample_rate(&self) -> f32;

    /// Monotonic rendering-clock time in seconds.
    fn now(&self) -> f64;

    fn state(&self) -> ContextState;

    /// Ask the context to start rendering. May be refused.
    fn resume(&mut self) -> Result<(), ResumeError>;

    /// Stop rendering for good.
    fn close(&mut self);

    fn destination(&self) -> NodeId {
        NodeId::DESTINATION
    }

    fn create_tone(&mut self, wave: Wave) -> NodeId;
    fn create_noise(&mut self, buffer: &NoiseBuffer) -> NodeId;
    fn create_gain(&mut self, level: f32) -> NodeId;
    fn create_filter(&mut self, kind: FilterKind, frequency: f32, q: f32) -> NodeId;

    /// Route `src`'s output into `dst`'s input.
    fn connect(&mut self, src: NodeId, dst: NodeId);

    /// Route `src`'s output into a parameter of `dst`, added to its value.
    fn connect_param(&mut self, src: NodeId, dst: NodeId, param: ParamKind);

    fn automate(&mut self, node: NodeId, param: ParamKind, event: Automation);

    /// Drop every automation event at or after `from`.
    fn cancel_scheduled_values(&mut self, node: NodeId, param: ParamKind, from: f64);

    /// Set a parameter right away, discarding its automation.
    fn set_value(&mut self, node: NodeId, param: ParamKind, value: f32);

    fn start(&mut self, node: NodeId, at: f64);
    fn stop(&mut self, node: NodeId, at: f64);

    fn set_value_at_time(&mut self, node: NodeId, param: ParamKind, value: f32, at: f64) {
        self.automate(node, param, Automation::SetValue { value, at });
    }

    fn linear_ramp_to_value_at_time(&mut self, node: NodeId, param: ParamKind, value: f32, until: f64) {
        self.automate(node, param, Automation::LinearRamp { value, until });
    }

    fn exponential_ramp_to_value_at_time(&mut self, node: NodeId, param: ParamKind, value: f32, until: f64) {
        self.automate(node, param, Automation::ExponentialRamp { value, until });
    }

    /// Schedule a curve given as absolute breakpoints.
    fn apply_curve(&mut self, node: NodeId, param: ParamKind, points: &[Breakpoint]) {
        for bp in points {
            self.automate(node, param, Automation::from(*bp));
        }
    }
}
