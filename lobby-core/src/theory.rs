//! Pitch and chord helpers.
//!
//! Pitches are semitone numbers on the MIDI scale (60 = middle C, 69 = A4).
//! Everything here is pure and total.

use crate::dsp::exp2;

/// Concert pitch reference: semitone 69 sounds at 440 Hz.
pub const REFERENCE_PITCH: i32 = 69;
pub const REFERENCE_HZ: f32 = 440.0;

/// Beats in one bar; the engine only plays in 4/4.
pub const BEATS_PER_BAR: u32 = 4;

/// Equal-tempered frequency of a semitone number.
#[inline]
pub fn pitch_to_frequency(pitch: i32) -> f32 {
    REFERENCE_HZ * exp2((pitch - REFERENCE_PITCH) as f32 / 12.0)
}

/// Seventh-chord qualities used by the progression.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Quality {
    Major7,
    Minor7,
    Dominant7,
}

impl Quality {
    /// Semitone offsets of root, third, fifth and seventh.
    #[inline]
    pub const fn intervals(self) -> [i32; 4] {
        match self {
            Quality::Major7 => [0, 4, 7, 11],
            Quality::Minor7 => [0, 3, 7, 10],
            Quality::Dominant7 => [0, 4, 7, 10],
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChordSpec {
    pub root: i32,
    pub quality: Quality,
}

impl ChordSpec {
    pub const fn new(root: i32, quality: Quality) -> Self {
        Self { root, quality }
    }

    /// All four chord tones in close position.
    pub fn pitches(self) -> [i32; 4] {
        self.quality.intervals().map(|iv| self.root + iv)
    }

    /// Three-note pad voicing: root, third, and the fifth lifted an octave
    /// for brightness. The seventh is left out.
    pub fn pad_voicing(self) -> [i32; 3] {
        let [root, third, fifth, _] = self.pitches();
        [root, third, fifth + 12]
    }
}

/// Fixed tempo, construction-time only.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// `bpm` is clamped to [1, 1000]; non-finite input falls back to 92.
    pub fn new(bpm: f64) -> Self {
        let bpm = if bpm.is_finite() { bpm.clamp(1.0, 1000.0) } else { 92.0 };
        Self { bpm }
    }

    #[inline] pub fn bpm(&self) -> f64 { self.bpm }

    /// Seconds per beat.
    #[inline] pub fn beat(&self) -> f64 { 60.0 / self.bpm }

    /// Seconds per 4/4 bar.
    #[inline] pub fn bar(&self) -> f64 { self.beat() * BEATS_PER_BAR as f64 }

    /// Seconds spanned by `beats` beats (fractional beats allowed).
    #[inline] pub fn beats(&self, beats: f64) -> f64 { self.beat() * beats }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(92.0)
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_pitch_is_exact() {
        assert_eq!(pitch_to_frequency(69), 440.0);
    }

    #[test]
    fn octave_doubles_frequency() {
        assert!((pitch_to_frequency(81) - 880.0).abs() < 1e-3);
        assert!((pitch_to_frequency(57) - 220.0).abs() < 1e-3);
        assert!((pitch_to_frequency(60) - 261.6256).abs() < 1e-2);
    }

    #[test]
    fn qualities_have_expected_intervals() {
        assert_eq!(Quality::Major7.intervals(), [0, 4, 7, 11]);
        assert_eq!(Quality::Minor7.intervals(), [0, 3, 7, 10]);
        assert_eq!(Quality::Dominant7.intervals(), [0, 4, 7, 10]);
    }

    #[test]
    fn pad_voicing_lifts_the_fifth() {
        assert_eq!(ChordSpec::new(60, Quality::Major7).pad_voicing(), [60, 64, 79]);
        assert_eq!(ChordSpec::new(57, Quality::Minor7).pad_voicing(), [57, 60, 76]);
    }

    #[test]
    fn tempo_derives_beat_and_bar() {
        let t = Tempo::default();
        assert_eq!(t.beat(), 60.0 / 92.0);
        assert_eq!(t.bar(), 4.0 * 60.0 / 92.0);
        assert_eq!(t.beats(0.5), 0.5 * 60.0 / 92.0);
    }

    #[test]
    fn tempo_clamps_out_of_range_bpm() {
        assert_eq!(Tempo::new(0.5).bpm(), 1.0);
        assert_eq!(Tempo::new(5000.0).bpm(), 1000.0);
        assert_eq!(Tempo::new(f64::NAN).bpm(), 92.0);
        assert_eq!(Tempo::new(120.0).bpm(), 120.0);
    }
}
