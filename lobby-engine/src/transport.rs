//! Transport and output bus.
//!
//! [`MusicEngine`] owns everything: the context, the bus gain every voice
//! feeds, the scheduler and the two recurring tasks (the scheduling tick and
//! the activation retry). The host drives it with [`MusicEngine::poll`].
//!
//! ```text
//!            start()                 output live
//!   Idle ─────────────▶ Starting ─────────────────▶ Running
//!    ▲                     │                           │
//!    │  fade over /        │ stop()                    │ stop()
//!    │  output idle        ▼                           │
//!    └──────────────── Stopping ◀──────────────────────┘
//!                          │ start() restarts
//! ```

use std::time::Instant;

use lobby_core::envelopes::FLOOR;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::context::{AudioContext, ContextState, NodeId, NoiseBuffer, ParamKind, ResumeError};
use crate::progression::Progression;
use crate::scheduler::LookaheadScheduler;
use crate::timer::{TaskId, Timers};
use crate::voices::Synth;
use crate::Result;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    /// Scheduling, waiting for the context to report `Running`.
    Starting,
    Running,
    /// Bus fading out; no new notes.
    Stopping,
}

pub struct MusicEngine<C: AudioContext> {
    ctx: C,
    config: EngineConfig,
    bus: NodeId,
    synth: Synth,
    scheduler: LookaheadScheduler,
    timers: Timers,
    tick_task: Option<TaskId>,
    retry_task: Option<TaskId>,
    state: TransportState,
    volume: f32,
    fade_until: Option<f64>,
    voices_scheduled: u64,
}

impl<C: AudioContext> MusicEngine<C> {
    pub fn new(mut ctx: C, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let tempo = config.tempo();

        let bus = ctx.create_gain(config.master_level);
        let dest = ctx.destination();
        ctx.connect(bus, dest);

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let len = ((config.noise_secs * f64::from(ctx.sample_rate())).round() as usize).max(1);
        let noise = NoiseBuffer::white(len, &mut rng);

        let synth = Synth::new(bus, noise, tempo);
        let scheduler = LookaheadScheduler::new(tempo, config.lookahead_secs, Progression::in_key(config.key));
        debug!(bpm = tempo.bpm(), key = config.key, noise_len = len, "engine created");

        Ok(Self {
            ctx,
            volume: config.master_level,
            config,
            bus,
            synth,
            scheduler,
            timers: Timers::new(),
            tick_task: None,
            retry_task: None,
            state: TransportState::Idle,
            fade_until: None,
            voices_scheduled: 0,
        })
    }

    /// Begin (or resume after a stop) playback. `now` is the host's clock.
    pub fn start(&mut self, now: Instant) {
        match self.state {
            TransportState::Idle | TransportState::Stopping => {}
            state => {
                debug!(?state, "start ignored");
                return;
            }
        }

        // Undo a fade that may still be running.
        self.ctx.set_value(self.bus, ParamKind::Gain, self.volume);
        self.fade_until = None;

        self.scheduler.align(self.ctx.now() + self.config.start_offset_secs);
        self.state = TransportState::Starting;
        info!(playhead = self.scheduler.playhead(), "starting");

        self.request_activation();
        self.settle();
        self.run_tick();

        self.cancel_tasks();
        self.tick_task = Some(self.timers.every(now, self.config.tick_interval()));
        if self.ctx.state() != ContextState::Running {
            debug!("audio output not live yet; retrying activation");
            self.retry_task = Some(self.timers.every(now, self.config.retry_interval()));
        }
    }

    /// Fade the bus out. Notes already handed to the context play out.
    pub fn stop(&mut self) {
        match self.state {
            TransportState::Starting | TransportState::Running => {}
            state => {
                debug!(?state, "stop ignored");
                return;
            }
        }
        self.cancel_tasks();

        let now = self.ctx.now();
        let until = now + self.config.fade_out_secs;
        self.ctx.cancel_scheduled_values(self.bus, ParamKind::Gain, now);
        self.ctx.set_value_at_time(self.bus, ParamKind::Gain, self.volume, now);
        self.ctx.linear_ramp_to_value_at_time(self.bus, ParamKind::Gain, FLOOR, until);
        self.fade_until = Some(until);
        self.state = TransportState::Stopping;
        info!(until, "stopping");
    }

    /// Set the bus level right away, clamped to [0, 1].
    ///
    /// While stopping, the fade restarts from the new level and still ends at
    /// the original deadline.
    pub fn set_volume(&mut self, level: f32) {
        if level.is_nan() {
            debug!("NaN volume ignored");
            return;
        }
        self.volume = level.clamp(0.0, 1.0);
        let now = self.ctx.now();
        match self.fade_until {
            Some(until) if self.state == TransportState::Stopping && until > now => {
                self.ctx.cancel_scheduled_values(self.bus, ParamKind::Gain, now);
                self.ctx.set_value_at_time(self.bus, ParamKind::Gain, self.volume, now);
                self.ctx.linear_ramp_to_value_at_time(self.bus, ParamKind::Gain, FLOOR, until);
            }
            _ => self.ctx.set_value(self.bus, ParamKind::Gain, self.volume),
        }
    }

    /// Run due tasks, then advance the transport state.
    pub fn poll(&mut self, now: Instant) {
        while let Some(id) = self.timers.pop_due(now) {
            if Some(id) == self.tick_task {
                self.run_tick();
            } else if Some(id) == self.retry_task {
                self.retry();
            }
        }
        self.settle();
    }

    /// Stop everything and hand back the closed context.
    pub fn destroy(mut self) -> C {
        self.cancel_tasks();
        self.ctx.close();
        info!(bars = self.scheduler.bars_scheduled(), "engine destroyed");
        self.ctx
    }

    fn cancel_tasks(&mut self) {
        if let Some(id) = self.tick_task.take() {
            self.timers.cancel(id);
        }
        self.cancel_retry();
    }

    fn cancel_retry(&mut self) {
        if let Some(id) = self.retry_task.take() {
            self.timers.cancel(id);
        }
    }

    fn request_activation(&mut self) {
        if let Err(err) = self.ctx.resume() {
            debug!(%err, "activation refused");
        }
    }

    fn run_tick(&mut self) {
        let now = self.ctx.now();
        let ctx = &mut self.ctx;
        let synth = &self.synth;
        let mut voices = 0u64;
        let bars = self.scheduler.tick(now, |cue| {
            voices += synth.perform(ctx, cue).len() as u64;
        });
        self.voices_scheduled += voices;
        if bars > 0 {
            trace!(bars, voices, playhead = self.scheduler.playhead(), "scheduled");
        }
    }

    fn retry(&mut self) {
        match self.ctx.resume() {
            Ok(()) => {}
            Err(ResumeError::Blocked) => debug!("audio output still blocked"),
            Err(ResumeError::Closed) => {
                warn!("audio context closed; giving up on activation");
                self.cancel_retry();
                return;
            }
        }
        if self.ctx.state() == ContextState::Running {
            self.cancel_retry();
        }
    }

    fn settle(&mut self) {
        match self.state {
            TransportState::Starting if self.ctx.state() == ContextState::Running => {
                self.cancel_retry();
                self.state = TransportState::Running;
                info!("audio output running");
            }
            TransportState::Stopping => {
                let faded = self.fade_until.map_or(true, |t| self.ctx.now() >= t);
                if faded || self.ctx.state() != ContextState::Running {
                    self.fade_until = None;
                    self.state = TransportState::Idle;
                    info!("stopped");
                }
            }
            _ => {}
        }
    }

    #[inline]
    pub fn state(&self) -> TransportState {
        self.state
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Start time of the next bar to be scheduled.
    #[inline]
    pub fn playhead(&self) -> f64 {
        self.scheduler.playhead()
    }

    #[inline]
    pub fn bars_scheduled(&self) -> u64 {
        self.scheduler.bars_scheduled()
    }

    #[inline]
    pub fn voices_scheduled(&self) -> u64 {
        self.voices_scheduled
    }

    #[inline]
    pub fn retry_pending(&self) -> bool {
        self.retry_task.is_some()
    }

    #[inline]
    pub fn ticking(&self) -> bool {
        self.tick_task.is_some()
    }

    /// When `poll` next has work, if ever.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    #[inline]
    pub fn bus(&self) -> NodeId {
        self.bus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.ctx
    }
}

// ------------------------------------ Tests --------------------------------------
