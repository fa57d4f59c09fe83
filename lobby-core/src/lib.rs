#![cfg_attr(not(feature = "std"), no_std)]
//! Lobby Core: theory, envelope shapes and DSP primitives for the Lobby
//! background-music engine.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use `libm`/`micromath` math backends
//! - `fast-math`: polynomial sine for the oscillator hot path
//!
//! Modules
//! - [`theory`]    : pitch → frequency, chord qualities and voicings, tempo
//! - [`envelopes`] : absolute-time envelope shapes (attack/release, glides)
//! - [`filters`]   : TPT state-variable filter
//! - [`dsp`]       : math backend and small helpers
//!
//! Nothing here allocates; the engine crate builds graphs and clocks on top.

pub mod dsp;
pub mod envelopes;
pub mod filters;
pub mod theory;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{clamp, exp_interp, fast_sin, lerp, wrap01, TAU};
    pub use crate::envelopes::{Breakpoint, ExpEnvelope, ExpGlide, Segment, FLOOR};
    pub use crate::filters::{Response, StateVariable};
    pub use crate::theory::{pitch_to_frequency, ChordSpec, Quality, Tempo, BEATS_PER_BAR};
}
