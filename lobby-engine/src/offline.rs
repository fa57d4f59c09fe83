//! Single-threaded context that renders on the caller's thread.
//!
//! Used by the FFI host loop, the benches and most tests. The clock only
//! advances while the context is `Running`, so a suspended context renders
//! silence and its `now()` stands still, the same way a blocked browser
//! context would.

use crate::context::{AudioContext, ContextState, FilterKind, NodeId, NoiseBuffer, ParamKind, ResumeError, Wave};
use crate::graph::{Command, Graph};
use crate::param::Automation;

/// Frames rendered between two garbage-collection passes.
pub const BLOCK: usize = 128;

/// Whether `resume()` succeeds without a user gesture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Autoplay {
    #[default]
    Allowed,
    RequiresGesture,
}

pub struct OfflineContext {
    graph: Graph,
    next_id: u32,
    frame: u64,
    state: ContextState,
    autoplay: Autoplay,
    gesture: bool,
    scratch: Vec<f32>,
}

impl OfflineContext {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_autoplay(sample_rate, Autoplay::Allowed)
    }

    pub fn with_autoplay(sample_rate: f32, autoplay: Autoplay) -> Self {
        Self {
            graph: Graph::new(sample_rate),
            next_id: 1,
            frame: 0,
            state: ContextState::Suspended,
            autoplay,
            gesture: false,
            scratch: vec![0.0; BLOCK],
        }
    }

    /// Record a user interaction; the next `resume()` is allowed through.
    pub fn grant_gesture(&mut self) {
        self.gesture = true;
    }

    /// Fill `out` with mono samples. Silence (and a frozen clock) unless running.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.state != ContextState::Running {
            out.fill(0.0);
            return;
        }
        for chunk in out.chunks_mut(BLOCK) {
            self.graph.render(chunk, self.frame);
            self.frame += chunk.len() as u64;
        }
    }

    /// Render and discard roughly `secs` seconds of audio.
    pub fn advance(&mut self, secs: f64) {
        let frames = (secs.max(0.0) * f64::from(self.graph.sample_rate())).round() as u64;
        let mut scratch = std::mem::take(&mut self.scratch);
        let mut left = frames;
        while left > 0 {
            let n = left.min(BLOCK as u64) as usize;
            self.render(&mut scratch[..n]);
            left -= n as u64;
        }
        self.scratch = scratch;
    }

    /// Frames rendered since creation.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frame
    }

    /// Live graph nodes, the destination included.
    pub fn live_nodes(&self) -> usize {
        self.graph.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.graph.contains(node)
    }

    /// Value a parameter will have at `t`, if the node and parameter exist.
    pub fn param_value(&self, node: NodeId, param: ParamKind, t: f64) -> Option<f32> {
        self.graph.param_value(node, param, t)
    }

    fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }
}

impl AudioContext for OfflineContext {
    fn sample_rate(&self) -> f32 {
        self.graph.sample_rate()
    }

    fn now(&self) -> f64 {
        self.frame as f64 / f64::from(self.graph.sample_rate())
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<(), ResumeError> {
        match self.state {
            ContextState::Closed => Err(ResumeError::Closed),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                if self.autoplay == Autoplay::RequiresGesture && !self.gesture {
                    return Err(ResumeError::Blocked);
                }
                self.state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        self.state = ContextState::Closed;
    }

    fn create_tone(&mut self, wave: Wave) -> NodeId {
        let id = self.alloc();
        self.graph.apply(Command::Tone { id, wave });
        id
    }

    fn create_noise(&mut self, buffer: &NoiseBuffer) -> NodeId {
        let id = self.alloc();
        self.graph.apply(Command::Noise { id, buffer: buffer.clone() });
        id
    }

    fn create_gain(&mut self, level: f32) -> NodeId {
        let id = self.alloc();
        self.graph.apply(Command::Gain { id, level });
        id
    }

    fn create_filter(&mut self, kind: FilterKind, frequency: f32, q: f32) -> NodeId {
        let id = self.alloc();
        self.graph.apply(Command::Filter { id, kind, frequency, q });
        id
    }

    fn connect(&mut self, src: NodeId, dst: NodeId) {
        self.graph.apply(Command::Connect { src, dst });
    }

    fn connect_param(&mut self, src: NodeId, dst: NodeId, param: ParamKind) {
        self.graph.apply(Command::ConnectParam { src, dst, param });
    }

    fn automate(&mut self, node: NodeId, param: ParamKind, event: Automation) {
        self.graph.apply(Command::Automate { node, param, event });
    }

    fn cancel_scheduled_values(&mut self, node: NodeId, param: ParamKind, from: f64) {
        self.graph.apply(Command::Cancel { node, param, from });
    }

    fn set_value(&mut self, node: NodeId, param: ParamKind, value: f32) {
        self.graph.apply(Command::Set { node, param, value });
    }

    fn start(&mut self, node: NodeId, at: f64) {
        self.graph.apply(Command::Start { node, at });
    }

    fn stop(&mut self, node: NodeId, at: f64) {
        self.graph.apply(Command::Stop { node, at });
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspended_context_renders_silence_and_holds_its_clock() {
        let mut ctx = OfflineContext::new(48_000.0);
        let mut out = vec![1.0; 64];
        ctx.render(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(ctx.now(), 0.0);
    }

    #[test]
    fn gesture_gate_blocks_until_granted() {
        let mut ctx = OfflineContext::with_autoplay(48_000.0, Autoplay::RequiresGesture);
        assert_eq!(ctx.resume(), Err(ResumeError::Blocked));
        assert_eq!(ctx.state(), ContextState::Suspended);
        ctx.grant_gesture();
        assert_eq!(ctx.resume(), Ok(()));
        assert_eq!(ctx.state(), ContextState::Running);
    }

    #[test]
    fn closed_context_refuses_resume() {
        let mut ctx = OfflineContext::new(48_000.0);
        ctx.close();
        assert_eq!(ctx.resume(), Err(ResumeError::Closed));
    }

    #[test]
    fn clock_advances_with_rendered_frames() {
        let mut ctx = OfflineContext::new(8_000.0);
        ctx.resume().unwrap();
        ctx.advance(0.5);
        assert_eq!(ctx.frames(), 4_000);
        assert!((ctx.now() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn ids_are_unique_and_skip_the_destination() {
        let mut ctx = OfflineContext::new(8_000.0);
        let a = ctx.create_gain(1.0);
        let b = ctx.create_tone(Wave::Sine);
        assert_ne!(a, NodeId::DESTINATION);
        assert_ne!(a, b);
        assert_eq!(ctx.live_nodes(), 3);
    }

    #[test]
    fn scheduled_tone_is_audible_through_a_gain() {
        let mut ctx = OfflineContext::new(8_000.0);
        ctx.resume().unwrap();
        let osc = ctx.create_tone(Wave::Sine);
        ctx.set_value(osc, ParamKind::Frequency, 220.0);
        let amp = ctx.create_gain(0.25);
        ctx.connect(osc, amp);
        let dest = ctx.destination();
        ctx.connect(amp, dest);
        ctx.start(osc, 0.0);
        ctx.stop(osc, 0.1);

        let mut out = vec![0.0; 1_600];
        ctx.render(&mut out);
        assert!(out[..800].iter().any(|s| s.abs() > 0.2));
        assert!(out[900..].iter().all(|s| *s == 0.0));
    }
}
