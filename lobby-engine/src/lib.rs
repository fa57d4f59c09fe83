//! Lobby Engine: procedural background music on top of an audio-context seam.
//!
//! Crate layout:
//! - [`context`]     : `AudioContext` trait, node handles, noise buffer
//! - [`param`]       : timestamped parameter automation
//! - [`offline`]     : single-threaded context rendering into caller buffers
//! - [`realtime`]    : context/renderer pair joined by a lock-free ring (feature `realtime`)
//! - [`voices`]      : pad, bass, hi-hat and snare graphs
//! - [`progression`] : endless I–vi–ii–V cycle
//! - [`scheduler`]   : lookahead scheduler turning coarse ticks into exact cue times
//! - [`timer`]       : cooperative recurring tasks
//! - [`transport`]   : `MusicEngine`, the output bus and start/stop/volume
//! - [`config`]      : serde-loadable `EngineConfig`
//!
//! The control side never touches samples; it describes notes at absolute
//! times and lets the context render them.

pub mod config;
pub mod context;
mod error;
mod graph;
pub mod offline;
pub mod param;
pub mod progression;
#[cfg(feature = "realtime")]
pub mod realtime;
pub mod scheduler;
pub mod timer;
pub mod transport;
pub mod voices;

#[cfg(test)]
pub(crate) mod testing;

pub use config::EngineConfig;
pub use context::{AudioContext, ContextState, FilterKind, NodeId, NoiseBuffer, ParamKind, ResumeError, Wave};
pub use error::{Error, Result};
pub use offline::{Autoplay, OfflineContext};
pub use param::{AudioParam, Automation};
pub use progression::Progression;
pub use scheduler::{Cue, LookaheadScheduler, Part};
pub use transport::{MusicEngine, TransportState};
pub use voices::{Synth, Voice, VoiceKind};

#[cfg(feature = "realtime")]
pub use realtime::{channel, RealtimeContext, Renderer};

pub use lobby_core::theory::{ChordSpec, Quality, Tempo};
