//! Construction-time engine settings.
//!
//! Tempo and key are fixed for an engine's lifetime. Every field has a
//! default, so a JSON file only needs to name what it changes.

use std::time::Duration;

use lobby_core::theory::Tempo;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bpm: f64,
    /// Tonic of the progression as a semitone number (60 = middle C).
    pub key: i32,
    /// How far past the rendering clock each tick schedules, in seconds.
    pub lookahead_secs: f64,
    pub tick_interval_ms: u64,
    /// Period of the activation retry while output is blocked.
    pub retry_interval_ms: u64,
    pub fade_out_secs: f64,
    /// Gap between `start()` and the first downbeat.
    pub start_offset_secs: f64,
    /// Initial output bus level in [0, 1].
    pub master_level: f32,
    /// Length of the shared percussion noise buffer.
    pub noise_secs: f64,
    /// Fixed seed for the noise buffer; random when absent.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bpm: 92.0,
            key: 60,
            lookahead_secs: 0.2,
            tick_interval_ms: 100,
            retry_interval_ms: 1_000,
            fade_out_secs: 1.0,
            start_offset_secs: 0.05,
            master_level: 0.06,
            noise_secs: 0.25,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1.0..=1000.0).contains(&self.bpm) {
            return Err(Error::config(format!("bpm must be in [1, 1000], got {}", self.bpm)));
        }
        if !(12..=115).contains(&self.key) {
            return Err(Error::config(format!("key {} leaves the playable range 12..=115", self.key)));
        }
        if self.tick_interval_ms == 0 || self.retry_interval_ms == 0 {
            return Err(Error::config("timer intervals must be non-zero"));
        }
        let tick = self.tick_interval().as_secs_f64();
        if !self.lookahead_secs.is_finite() || self.lookahead_secs <= tick {
            return Err(Error::config(format!(
                "lookahead {}s must exceed the tick interval {}s",
                self.lookahead_secs, tick
            )));
        }
        if !self.fade_out_secs.is_finite() || self.fade_out_secs < 0.0 {
            return Err(Error::config("fade_out_secs must be a non-negative number"));
        }
        if !self.start_offset_secs.is_finite() || self.start_offset_secs < 0.0 {
            return Err(Error::config("start_offset_secs must be a non-negative number"));
        }
        if !(0.0..=1.0).contains(&self.master_level) {
            return Err(Error::config(format!("master_level must be in [0, 1], got {}", self.master_level)));
        }
        if !self.noise_secs.is_finite() || self.noise_secs <= 0.0 || self.noise_secs > 10.0 {
            return Err(Error::config("noise_secs must be in (0, 10]"));
        }
        Ok(())
    }

    #[inline]
    pub fn tempo(&self) -> Tempo {
        Tempo::new(self.bpm)
    }

    #[inline]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[inline]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}
