//! Context whose graph lives inside a device callback.
//!
//! [`channel`] splits the context in two. The [`RealtimeContext`] half stays
//! on the control thread and turns every `AudioContext` call into a
//! graph command pushed onto a lock-free ring; the [`Renderer`] half moves into
//! the audio callback, drains the ring at the top of each block and renders.
//!
//! The clock is the renderer's frame counter, published through an atomic.
//! `resume()` only raises a flag: the context becomes `Running` when the
//! callback actually runs, which is what "the output is live" means.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::context::{AudioContext, ContextState, FilterKind, NodeId, NoiseBuffer, ParamKind, ResumeError, Wave};
use crate::graph::{Command, Graph};
use crate::param::Automation;

/// Default ring size; one bar of music is roughly a hundred commands.
pub const DEFAULT_CAPACITY: usize = 8192;

const SCRATCH: usize = 512;

struct Shared {
    frames: AtomicU64,
    state: AtomicU8,
    resume_requested: AtomicBool,
}

/// Create a connected context/renderer pair.
pub fn channel(sample_rate: f32, capacity: usize) -> (RealtimeContext, Renderer) {
    let (tx, rx) = RingBuffer::<Command>::new(capacity.max(16));
    let shared = Arc::new(Shared {
        frames: AtomicU64::new(0),
        state: AtomicU8::new(ContextState::Suspended as u8),
        resume_requested: AtomicBool::new(false),
    });
    let ctx = RealtimeContext { tx, shared: Arc::clone(&shared), sr: sample_rate.max(1.0), next_id: 1, dropped: 0 };
    let renderer = Renderer { rx, graph: Graph::new(sample_rate), shared, frame: 0, mono: [0.0; SCRATCH] };
    (ctx, renderer)
}

pub struct RealtimeContext {
    tx: Producer<Command>,
    shared: Arc<Shared>,
    sr: f32,
    next_id: u32,
    dropped: u64,
}

impl RealtimeContext {
    /// Commands lost to a full ring since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn send(&mut self, cmd: Command) {
        match self.tx.push(cmd) {
            Ok(()) => {}
            Err(PushError::Full(cmd)) => {
                self.dropped += 1;
                tracing::warn!(?cmd, dropped = self.dropped, "render command ring full; dropping command");
            }
        }
    }

    fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }
}

impl AudioContext for RealtimeContext {
    fn sample_rate(&self) -> f32 {
        self.sr
    }

    fn now(&self) -> f64 {
        self.shared.frames.load(Ordering::Acquire) as f64 / f64::from(self.sr)
    }

    fn state(&self) -> ContextState {
        ContextState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    fn resume(&mut self) -> Result<(), ResumeError> {
        match self.state() {
            ContextState::Closed => Err(ResumeError::Closed),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                self.shared.resume_requested.store(true, Ordering::Release);
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        self.shared.state.store(ContextState::Closed as u8, Ordering::Release);
    }

    fn create_tone(&mut self, wave: Wave) -> NodeId {
        let id = self.alloc();
        self.send(Command::Tone { id, wave });
        id
    }

    fn create_noise(&mut self, buffer: &NoiseBuffer) -> NodeId {
        let id = self.alloc();
        self.send(Command::Noise { id, buffer: buffer.clone() });
        id
    }

    fn create_gain(&mut self, level: f32) -> NodeId {
        let id = self.alloc();
        self.send(Command::Gain { id, level });
        id
    }

    fn create_filter(&mut self, kind: FilterKind, frequency: f32, q: f32) -> NodeId {
        let id = self.alloc();
        self.send(Command::Filter { id, kind, frequency, q });
        id
    }

    fn connect(&mut self, src: NodeId, dst: NodeId) {
        self.send(Command::Connect { src, dst });
    }

    fn connect_param(&mut self, src: NodeId, dst: NodeId, param: ParamKind) {
        self.send(Command::ConnectParam { src, dst, param });
    }

    fn automate(&mut self, node: NodeId, param: ParamKind, event: Automation) {
        self.send(Command::Automate { node, param, event });
    }

    fn cancel_scheduled_values(&mut self, node: NodeId, param: ParamKind, from: f64) {
        self.send(Command::Cancel { node, param, from });
    }

    fn set_value(&mut self, node: NodeId, param: ParamKind, value: f32) {
        self.send(Command::Set { node, param, value });
    }

    fn start(&mut self, node: NodeId, at: f64) {
        self.send(Command::Start { node, at });
    }

    fn stop(&mut self, node: NodeId, at: f64) {
        self.send(Command::Stop { node, at });
    }
}

/// Audio-thread half. Allocates only when a command grows the graph.
pub struct Renderer {
    rx: Consumer<Command>,
    graph: Graph,
    shared: Arc<Shared>,
    frame: u64,
    mono: [f32; SCRATCH],
}

impl Renderer {
    fn begin_block(&mut self) -> bool {
        while let Ok(cmd) = self.rx.pop() {
            self.graph.apply(cmd);
        }
        let mut state = ContextState::from_u8(self.shared.state.load(Ordering::Acquire));
        if state == ContextState::Suspended && self.shared.resume_requested.swap(false, Ordering::AcqRel) {
            // A close may have raced the request; never reopen a closed context.
            if self
                .shared
                .state
                .compare_exchange(
                    ContextState::Suspended as u8,
                    ContextState::Running as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                state = ContextState::Running;
            }
        }
        state == ContextState::Running
    }

    fn advance(&mut self, frames: usize) {
        self.frame += frames as u64;
        self.shared.frames.store(self.frame, Ordering::Release);
    }

    /// Render mono samples into `out`.
    pub fn process(&mut self, out: &mut [f32]) {
        if !self.begin_block() {
            out.fill(0.0);
            return;
        }
        for chunk in out.chunks_mut(SCRATCH) {
            self.graph.render(chunk, self.frame);
            self.advance(chunk.len());
        }
    }

    /// Render into an interleaved buffer, copying the mono signal to every channel.
    pub fn process_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        if !self.begin_block() {
            out.fill(0.0);
            return;
        }
        for frame_chunk in out.chunks_mut(SCRATCH * channels) {
            let n = frame_chunk.len() / channels;
            let mono = &mut self.mono[..n];
            self.graph.render(mono, self.frame);
            for (frame, s) in frame_chunk.chunks_mut(channels).zip(mono.iter()) {
                frame.fill(*s);
            }
            self.advance(n);
        }
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_takes_effect_when_the_callback_runs() {
        let (mut ctx, mut renderer) = channel(8_000.0, 64);
        assert_eq!(ctx.resume(), Ok(()));
        assert_eq!(ctx.state(), ContextState::Suspended);
        let mut out = [0.0f32; 80];
        renderer.process(&mut out);
        assert_eq!(ctx.state(), ContextState::Running);
        assert!((ctx.now() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn suspended_renderer_is_silent_and_clock_holds() {
        let (ctx, mut renderer) = channel(8_000.0, 64);
        let mut out = [1.0f32; 32];
        renderer.process(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(ctx.now(), 0.0);
    }

    #[test]
    fn commands_cross_the_ring_and_sound() {
        let (mut ctx, mut renderer) = channel(8_000.0, 64);
        ctx.resume().unwrap();
        let osc = ctx.create_tone(Wave::Square);
        ctx.set_value(osc, ParamKind::Frequency, 100.0);
        let dest = ctx.destination();
        ctx.connect(osc, dest);
        ctx.start(osc, 0.0);
        let mut out = [0.0f32; 2 * 160];
        renderer.process_interleaved(&mut out, 2);
        assert!(out.iter().any(|s| s.abs() > 0.5));
        assert!(out.chunks(2).all(|f| f[0] == f[1]));
        assert!((ctx.now() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn full_ring_drops_without_blocking() {
        let (mut ctx, _renderer) = channel(8_000.0, 16);
        for _ in 0..20 {
            ctx.create_gain(1.0);
        }
        assert_eq!(ctx.dropped(), 4);
    }

    #[test]
    fn closed_context_stays_closed() {
        let (mut ctx, mut renderer) = channel(8_000.0, 16);
        ctx.resume().unwrap();
        ctx.close();
        let mut out = [0.0f32; 16];
        renderer.process(&mut out);
        assert_eq!(ctx.state(), ContextState::Closed);
        assert_eq!(ctx.resume(), Err(ResumeError::Closed));
    }
}
