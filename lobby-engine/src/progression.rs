//! Endless I–vi–ii–V chord cycle.

use lobby_core::theory::{ChordSpec, Quality};

/// Tonic the default progression is built on (middle C).
pub const DEFAULT_TONIC: i32 = 60;

/// Deterministic four-chord loop. The chord table never changes after
/// construction; only the cursor moves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progression {
    chords: [ChordSpec; 4],
    cursor: u64,
}

impl Progression {
    /// I maj7, vi m7, ii m7, V7 around `tonic`. The vi and V sit below the
    /// tonic and the ii above it, keeping all roots within a fifth.
    pub fn in_key(tonic: i32) -> Self {
        Self {
            chords: [
                ChordSpec::new(tonic, Quality::Major7),
                ChordSpec::new(tonic - 3, Quality::Minor7),
                ChordSpec::new(tonic + 2, Quality::Minor7),
                ChordSpec::new(tonic - 5, Quality::Dominant7),
            ],
            cursor: 0,
        }
    }

    /// Current chord, then advance.
    pub fn next_chord(&mut self) -> ChordSpec {
        let chord = self.peek();
        self.cursor = self.cursor.wrapping_add(1);
        chord
    }

    #[inline]
    pub fn peek(&self) -> ChordSpec {
        self.chords[(self.cursor % 4) as usize]
    }

    #[inline]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}

impl Default for Progression {
    fn default() -> Self {
        Self::in_key(DEFAULT_TONIC)
    }
}

impl Iterator for Progression {
    type Item = ChordSpec;

    fn next(&mut self) -> Option<ChordSpec> {
        Some(self.next_chord())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_through_four_qualities() {
        let mut p = Progression::default();
        let q: Vec<_> = (0..8).map(|_| p.next_chord().quality).collect();
        use Quality::*;
        assert_eq!(q, vec![Major7, Minor7, Minor7, Dominant7, Major7, Minor7, Minor7, Dominant7]);
    }

    #[test]
    fn default_roots_match_c_major_registers() {
        let roots: Vec<_> = Progression::default().take(4).map(|c| c.root).collect();
        assert_eq!(roots, vec![60, 57, 62, 55]);
    }

    #[test]
    fn transposes_with_the_tonic() {
        let roots: Vec<_> = Progression::in_key(65).take(4).map(|c| c.root).collect();
        assert_eq!(roots, vec![65, 62, 67, 60]);
    }

    #[test]
    fn cursor_counts_calls() {
        let mut p = Progression::default();
        for _ in 0..10 {
            p.next_chord();
        }
        assert_eq!(p.cursor(), 10);
        assert_eq!(p.peek().root, 62);
    }
}
