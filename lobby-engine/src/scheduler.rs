//! Lookahead scheduler: coarse control ticks in, exact timestamps out.
//!
//! The control timer is allowed to be late, early or stalled. On every tick
//! the scheduler looks at the rendering clock and emits every bar whose start
//! falls before `now + window`; timestamps come only from the logical
//! playhead, never from when the tick happened to run.
//!
//! The playhead is `origin + bars * bar_len` rather than a running sum, so it
//! stays exact however long the engine plays.

use lobby_core::theory::{ChordSpec, Tempo, BEATS_PER_BAR};

use crate::progression::Progression;

/// Cues in one bar: chord, two bass notes, eight hats, two snares.
pub const CUES_PER_BAR: usize = 13;

/// What a cue plays.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Part {
    Chord(ChordSpec),
    /// Bass under the given chord root.
    Bass(i32),
    HiHat,
    Snare,
}

/// One musical event at an absolute rendering-clock time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Cue {
    pub at: f64,
    pub part: Part,
}

#[derive(Clone, Debug)]
pub struct LookaheadScheduler {
    tempo: Tempo,
    window: f64,
    origin: f64,
    /// Bars since `origin`.
    bar: u64,
    /// Bars since construction.
    total: u64,
    progression: Progression,
}

impl LookaheadScheduler {
    pub fn new(tempo: Tempo, window: f64, progression: Progression) -> Self {
        Self { tempo, window: window.max(0.0), origin: 0.0, bar: 0, total: 0, progression }
    }

    /// Start time of the next bar to be emitted.
    #[inline]
    pub fn playhead(&self) -> f64 {
        self.origin + self.bar as f64 * self.tempo.bar()
    }

    #[inline]
    pub fn bars_scheduled(&self) -> u64 {
        self.total
    }

    #[inline]
    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Move the playhead up to `not_before` if it is behind. Never moves back.
    pub fn align(&mut self, not_before: f64) {
        if self.playhead() < not_before {
            self.origin = not_before;
            self.bar = 0;
        }
    }

    /// Emit every bar starting before `now + window`. Returns the bar count.
    pub fn tick(&mut self, now: f64, mut emit: impl FnMut(&Cue)) -> usize {
        if !now.is_finite() {
            tracing::warn!(now, "non-finite clock reading; skipping tick");
            return 0;
        }
        let horizon = now + self.window;
        let mut bars = 0;
        while self.playhead() < horizon {
            let start = self.playhead();
            let chord = self.progression.next_chord();
            for cue in self.bar_cues(start, chord).iter() {
                emit(cue);
            }
            self.bar += 1;
            self.total += 1;
            bars += 1;
        }
        bars
    }

    /// Cues of the bar starting at `start`, in ascending time. Ties keep the
    /// order chord, bass, hat, snare.
    pub fn bar_cues(&self, start: f64, chord: ChordSpec) -> [Cue; CUES_PER_BAR] {
        let beat = self.tempo.beat();
        let half_bar = f64::from(BEATS_PER_BAR / 2) * beat;
        let at = |offset: f64| start + offset;

        let hat = |i: usize| Cue { at: at(0.5 * beat * i as f64), part: Part::HiHat };
        let mut cues = [
            Cue { at: start, part: Part::Chord(chord) },
            Cue { at: start, part: Part::Bass(chord.root) },
            Cue { at: at(half_bar), part: Part::Bass(chord.root) },
            hat(0),
            hat(1),
            hat(2),
            hat(3),
            hat(4),
            hat(5),
            hat(6),
            hat(7),
            Cue { at: at(beat), part: Part::Snare },
            Cue { at: at(3.0 * beat), part: Part::Snare },
        ];
        cues.sort_by(|a, b| a.at.total_cmp(&b.at));
        cues
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use lobby_core::theory::Quality;

    fn sched() -> LookaheadScheduler {
        LookaheadScheduler::new(Tempo::default(), 0.2, Progression::default())
    }

    fn bar() -> f64 {
        Tempo::default().bar()
    }

    #[test]
    fn first_tick_emits_only_the_first_bar() {
        let mut s = sched();
        let mut cues = Vec::new();
        assert_eq!(s.tick(0.0, |c| cues.push(*c)), 1);
        assert_eq!(cues.len(), CUES_PER_BAR);
        assert_eq!(s.tick(0.1, |_| {}), 0);
        assert!((s.playhead() - bar()).abs() < 1e-12);
    }

    #[test]
    fn bar_layout_is_half_beat_grid() {
        let s = sched();
        let half = 0.5 * 60.0 / 92.0;
        let cues = s.bar_cues(7.0, ChordSpec::new(60, Quality::Major7));
        for c in cues.iter() {
            let steps = (c.at - 7.0) / half;
            assert!((steps - steps.round()).abs() < 1e-9, "offset {steps} not on grid");
            assert!(steps >= 0.0 && steps < 8.0);
        }
        let count = |p: fn(&Part) -> bool| cues.iter().filter(|c| p(&c.part)).count();
        assert_eq!(count(|p| matches!(p, Part::Chord(_))), 1);
        assert_eq!(count(|p| matches!(p, Part::Bass(60))), 2);
        assert_eq!(count(|p| matches!(p, Part::HiHat)), 8);
        assert_eq!(count(|p| matches!(p, Part::Snare)), 2);
    }

    #[test]
    fn ties_keep_chord_bass_hat_order() {
        let s = sched();
        let cues = s.bar_cues(0.0, ChordSpec::new(60, Quality::Major7));
        assert!(matches!(cues[0].part, Part::Chord(_)));
        assert!(matches!(cues[1].part, Part::Bass(_)));
        assert!(matches!(cues[2].part, Part::HiHat));
    }

    #[test]
    fn timestamps_never_decrease_across_jittery_ticks() {
        let mut s = sched();
        let mut times = Vec::new();
        let jitter = [0.0, 0.13, 0.04, 0.31, 0.09, 0.0, 0.22];
        let mut now = 0.0;
        for i in 0..400 {
            now += 0.1 + jitter[i % jitter.len()];
            s.tick(now, |c| times.push(c.at));
        }
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert!(s.playhead() >= now);
    }

    #[test]
    fn stalled_clock_catches_up_exactly() {
        let mut s = sched();
        let now = 10.0 * bar() - 0.2 - 1e-9;
        let mut chords = 0;
        let bars = s.tick(now, |c| {
            if matches!(c.part, Part::Chord(_)) {
                chords += 1;
            }
        });
        assert_eq!(bars, 10);
        assert_eq!(chords, 10);
        assert_eq!(s.bars_scheduled(), 10);
    }

    #[test]
    fn catch_up_includes_the_lookahead_bar() {
        let mut s = sched();
        assert_eq!(s.tick(10.0 * bar(), |_| {}), 11);
    }

    #[test]
    fn playhead_has_no_accumulated_drift() {
        let mut s = sched();
        s.tick(1000.0 * bar(), |_| {});
        assert_eq!(s.playhead(), 1001.0 * bar());
    }

    #[test]
    fn align_only_moves_forward() {
        let mut s = sched();
        s.tick(0.0, |_| {});
        s.align(0.5);
        assert!((s.playhead() - bar()).abs() < 1e-12);
        s.align(100.0);
        assert_eq!(s.playhead(), 100.0);
        assert_eq!(s.bars_scheduled(), 1);
    }

    #[test]
    fn non_finite_clock_emits_nothing() {
        let mut s = sched();
        assert_eq!(s.tick(f64::INFINITY, |_| {}), 0);
        assert_eq!(s.tick(f64::NAN, |_| {}), 0);
    }

    #[test]
    fn progression_advances_once_per_bar() {
        let mut s = sched();
        let mut roots = Vec::new();
        s.tick(3.0 * bar() + 0.01, |c| {
            if let Part::Chord(ch) = c.part {
                roots.push(ch.root);
            }
        });
        assert_eq!(roots, vec![60, 57, 62, 55]);
    }
}
