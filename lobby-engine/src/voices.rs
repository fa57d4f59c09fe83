//! Voice synthesizer: one short-lived node graph per note.
//!
//! Every call allocates fresh nodes, wires them into the output bus and
//! schedules start, stop and envelope at absolute times. Nothing is kept on
//! the control side; the renderer owns the nodes until their stop time and
//! collects them afterwards. Two calls with different timestamps therefore
//! produce two independent notes, however close together.
//!
//! Instruments
//! - pad   : 2:1 FM sine pair per voicing note, decaying modulation depth
//! - bass  : plain sine an octave under the chord root
//! - hi-hat: noise → high-pass → short envelope
//! - snare : noise → band-pass → slightly longer envelope

use lobby_core::envelopes::{ExpEnvelope, ExpGlide};
use lobby_core::theory::{pitch_to_frequency, ChordSpec, Tempo};

use crate::context::{AudioContext, FilterKind, NodeId, NoiseBuffer, ParamKind, Wave};
use crate::scheduler::{Cue, Part};

// Pad
pub const PAD_PEAK: f32 = 0.12;
pub const PAD_ATTACK: f64 = 0.02;
/// Envelope end: this many beats plus `PAD_TAIL` seconds after the start.
pub const PAD_SUSTAIN_BEATS: f64 = 3.2;
pub const PAD_TAIL: f64 = 1.2;
pub const PAD_STOP_BEATS: f64 = 4.6;
pub const FM_RATIO: f32 = 2.0;
/// Modulation depth in Hz of carrier deviation.
pub const FM_DEPTH_START: f32 = 120.0;
pub const FM_DEPTH_END: f32 = 8.0;
pub const FM_DECAY: f64 = 0.25;

// Bass
pub const BASS_PEAK: f32 = 0.22;
pub const BASS_ATTACK: f64 = 0.01;
pub const BASS_SUSTAIN_BEATS: f64 = 0.8;
pub const BASS_TAIL: f64 = 0.25;
pub const BASS_STOP_BEATS: f64 = 1.2;

// Hi-hat
pub const HIHAT_CUTOFF: f32 = 7000.0;
pub const HIHAT_Q: f32 = 0.707;
pub const HIHAT_PEAK: f32 = 0.06;
pub const HIHAT_ATTACK: f64 = 0.002;
pub const HIHAT_END: f64 = 0.06;
pub const HIHAT_STOP: f64 = 0.08;

// Snare
pub const SNARE_CENTER: f32 = 1800.0;
pub const SNARE_Q: f32 = 0.6;
pub const SNARE_PEAK: f32 = 0.08;
pub const SNARE_ATTACK: f64 = 0.006;
pub const SNARE_END: f64 = 0.14;
pub const SNARE_STOP: f64 = 0.2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VoiceKind {
    Pad,
    Bass,
    HiHat,
    Snare,
}

/// Record of one scheduled note. Informational only.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Voice {
    pub kind: VoiceKind,
    /// Sounding pitch; `None` for noise percussion.
    pub pitch: Option<i32>,
    pub start: f64,
    pub stop: f64,
}

impl Voice {
    #[inline]
    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }
}

/// Builds instrument graphs into a fixed output bus.
#[derive(Clone, Debug)]
pub struct Synth {
    bus: NodeId,
    noise: NoiseBuffer,
    tempo: Tempo,
}

impl Synth {
    pub fn new(bus: NodeId, noise: NoiseBuffer, tempo: Tempo) -> Self {
        Self { bus, noise, tempo }
    }

    #[inline]
    pub fn bus(&self) -> NodeId {
        self.bus
    }

    pub fn pad_envelope(&self) -> ExpEnvelope {
        ExpEnvelope::new(PAD_PEAK, PAD_ATTACK, self.tempo.beats(PAD_SUSTAIN_BEATS) + PAD_TAIL)
    }

    pub fn bass_envelope(&self) -> ExpEnvelope {
        ExpEnvelope::new(BASS_PEAK, BASS_ATTACK, self.tempo.beats(BASS_SUSTAIN_BEATS) + BASS_TAIL)
    }

    /// Three FM voices, one per pad voicing note.
    pub fn chord_voice<C: AudioContext + ?Sized>(&self, ctx: &mut C, chord: ChordSpec, start: f64) -> [Voice; 3] {
        chord.pad_voicing().map(|pitch| self.fm_note(ctx, pitch, start))
    }

    fn fm_note<C: AudioContext + ?Sized>(&self, ctx: &mut C, pitch: i32, start: f64) -> Voice {
        let freq = pitch_to_frequency(pitch);
        let stop = start + self.tempo.beats(PAD_STOP_BEATS);

        let carrier = ctx.create_tone(Wave::Sine);
        ctx.set_value_at_time(carrier, ParamKind::Frequency, freq, start);

        let modulator = ctx.create_tone(Wave::Sine);
        ctx.set_value_at_time(modulator, ParamKind::Frequency, freq * FM_RATIO, start);
        let depth = ctx.create_gain(FM_DEPTH_START);
        let glide = ExpGlide::new(FM_DEPTH_START, FM_DEPTH_END, FM_DECAY);
        ctx.apply_curve(depth, ParamKind::Gain, &glide.breakpoints(start));
        ctx.connect(modulator, depth);
        ctx.connect_param(depth, carrier, ParamKind::Frequency);

        let amp = ctx.create_gain(0.0);
        ctx.apply_curve(amp, ParamKind::Gain, &self.pad_envelope().breakpoints(start));
        ctx.connect(carrier, amp);
        ctx.connect(amp, self.bus);

        ctx.start(carrier, start);
        ctx.start(modulator, start);
        ctx.stop(carrier, stop);
        ctx.stop(modulator, stop);

        Voice { kind: VoiceKind::Pad, pitch: Some(pitch), start, stop }
    }

    /// Sine one octave under `root`.
    pub fn bass_voice<C: AudioContext + ?Sized>(&self, ctx: &mut C, root: i32, start: f64) -> Voice {
        let pitch = root - 12;
        let stop = start + self.tempo.beats(BASS_STOP_BEATS);

        let osc = ctx.create_tone(Wave::Sine);
        ctx.set_value_at_time(osc, ParamKind::Frequency, pitch_to_frequency(pitch), start);
        let amp = ctx.create_gain(0.0);
        ctx.apply_curve(amp, ParamKind::Gain, &self.bass_envelope().breakpoints(start));
        ctx.connect(osc, amp);
        ctx.connect(amp, self.bus);
        ctx.start(osc, start);
        ctx.stop(osc, stop);

        Voice { kind: VoiceKind::Bass, pitch: Some(pitch), start, stop }
    }

    pub fn hihat<C: AudioContext + ?Sized>(&self, ctx: &mut C, start: f64) -> Voice {
        let env = ExpEnvelope::new(HIHAT_PEAK, HIHAT_ATTACK, HIHAT_END);
        let stop = start + HIHAT_STOP;
        self.noise_hit(ctx, FilterKind::Highpass, HIHAT_CUTOFF, HIHAT_Q, env, start, stop);
        Voice { kind: VoiceKind::HiHat, pitch: None, start, stop }
    }

    pub fn snare<C: AudioContext + ?Sized>(&self, ctx: &mut C, start: f64) -> Voice {
        let env = ExpEnvelope::new(SNARE_PEAK, SNARE_ATTACK, SNARE_END);
        let stop = start + SNARE_STOP;
        self.noise_hit(ctx, FilterKind::Bandpass, SNARE_CENTER, SNARE_Q, env, start, stop);
        Voice { kind: VoiceKind::Snare, pitch: None, start, stop }
    }

    #[allow(clippy::too_many_arguments)]
    fn noise_hit<C: AudioContext + ?Sized>(
        &self,
        ctx: &mut C,
        kind: FilterKind,
        freq: f32,
        q: f32,
        env: ExpEnvelope,
        start: f64,
        stop: f64,
    ) {
        let src = ctx.create_noise(&self.noise);
        let filter = ctx.create_filter(kind, freq, q);
        let amp = ctx.create_gain(0.0);
        ctx.apply_curve(amp, ParamKind::Gain, &env.breakpoints(start));
        ctx.connect(src, filter);
        ctx.connect(filter, amp);
        ctx.connect(amp, self.bus);
        ctx.start(src, start);
        ctx.stop(src, stop);
    }

    /// Schedule whatever instrument `cue` names.
    pub fn perform<C: AudioContext + ?Sized>(&self, ctx: &mut C, cue: &Cue) -> Vec<Voice> {
        match cue.part {
            Part::Chord(chord) => self.chord_voice(ctx, chord, cue.at).to_vec(),
            Part::Bass(root) => vec![self.bass_voice(ctx, root, cue.at)],
            Part::HiHat => vec![self.hihat(ctx, cue.at)],
            Part::Snare => vec![self.snare(ctx, cue.at)],
        }
    }
}

// ------------------------------------ Tests --------------------------------------
