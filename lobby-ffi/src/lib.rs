//! C ABI wrapper for the Lobby engine.
//!
//! The host owns the audio device and pulls samples; the engine renders with
//! an offline context that, like a browser, refuses to start until the host
//! reports a user gesture through `lobby_unlock`.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `LobbyEngine` (heap-allocated; free with `lobby_destroy`).
//! - Times passed in (`now_ms`) are host milliseconds since `lobby_create`.
//! - Rendering is mono internally and duplicated to every channel.
//! - Null handles are ignored; getters return 0.
//!
//! Threading
//! - Not thread-safe; call every function from the same thread.

use std::time::{Duration, Instant};

use lobby_engine::{Autoplay, EngineConfig, MusicEngine, OfflineContext, TransportState};

/// Opaque engine handle.
pub struct LobbyEngine {
    epoch: Instant,
    mono: Vec<f32>,
    inner: MusicEngine<OfflineContext>,
}

impl LobbyEngine {
    fn new(sample_rate: f32) -> Option<Self> {
        let sr = if sample_rate.is_finite() { sample_rate.max(1.0) } else { 48_000.0 };
        let ctx = OfflineContext::with_autoplay(sr, Autoplay::RequiresGesture);
        match MusicEngine::new(ctx, EngineConfig::default()) {
            Ok(inner) => Some(Self { epoch: Instant::now(), mono: Vec::new(), inner }),
            Err(err) => {
                tracing::error!(%err, "engine creation failed");
                None
            }
        }
    }

    fn at(&self, now_ms: u64) -> Instant {
        self.epoch + Duration::from_millis(now_ms)
    }
}

/// Run `f` on the engine behind `engine`, or return `default` for null.
fn with_engine<R>(engine: *mut LobbyEngine, default: R, f: impl FnOnce(&mut LobbyEngine) -> R) -> R {
    // SAFETY: non-null handles come from `lobby_create` and are only freed by `lobby_destroy`.
    match unsafe { engine.as_mut() } {
        Some(e) => f(e),
        None => default,
    }
}

// --- Creation / destruction -------------------------------------------------------

/// Create an engine rendering at `sample_rate`. Returns null on failure.
#[no_mangle]
pub extern "C" fn lobby_create(sample_rate: f32) -> *mut LobbyEngine {
    match LobbyEngine::new(sample_rate) {
        Some(e) => Box::into_raw(Box::new(e)),
        None => std::ptr::null_mut(),
    }
}

/// Destroy an engine returned by `lobby_create`. Null is ignored.
#[no_mangle]
pub extern "C" fn lobby_destroy(engine: *mut LobbyEngine) {
    if engine.is_null() {
        return;
    }
    // SAFETY: pointer came from `Box::into_raw` in `lobby_create`.
    let e = unsafe { Box::from_raw(engine) };
    let _ctx = e.inner.destroy();
}

// --- Transport --------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn lobby_start(engine: *mut LobbyEngine, now_ms: u64) {
    with_engine(engine, (), |e| {
        let at = e.at(now_ms);
        e.inner.start(at);
    });
}

#[no_mangle]
pub extern "C" fn lobby_stop(engine: *mut LobbyEngine) {
    with_engine(engine, (), |e| e.inner.stop());
}

/// Output level, clamped to [0, 1].
#[no_mangle]
pub extern "C" fn lobby_set_volume(engine: *mut LobbyEngine, level: f32) {
    with_engine(engine, (), |e| e.inner.set_volume(level));
}

/// Run due timers. Call at least every 100 ms.
#[no_mangle]
pub extern "C" fn lobby_poll(engine: *mut LobbyEngine, now_ms: u64) {
    with_engine(engine, (), |e| {
        let at = e.at(now_ms);
        e.inner.poll(at);
    });
}

/// Report a user gesture: lets a blocked output start on the next retry.
#[no_mangle]
pub extern "C" fn lobby_unlock(engine: *mut LobbyEngine) {
    with_engine(engine, (), |e| e.inner.context_mut().grant_gesture());
}

/// 0 = idle, 1 = starting, 2 = running, 3 = stopping.
#[no_mangle]
pub extern "C" fn lobby_state(engine: *mut LobbyEngine) -> u32 {
    with_engine(engine, 0, |e| match e.inner.state() {
        TransportState::Idle => 0,
        TransportState::Starting => 1,
        TransportState::Running => 2,
        TransportState::Stopping => 3,
    })
}

// --- Rendering --------------------------------------------------------------------

/// Render `frames` frames into an interleaved buffer of `channels` channels.
///
/// Returns the number of frames written (0 on bad arguments).
///
/// # Safety
/// `out_interleaved` must point to at least `frames * channels` writable floats.
#[no_mangle]
pub unsafe extern "C" fn lobby_render_interleaved_f32(
    engine: *mut LobbyEngine,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    if out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let ch = channels as usize;
    // SAFETY: caller guarantees the buffer length.
    let out = unsafe { std::slice::from_raw_parts_mut(out_interleaved, frames as usize * ch) };
    with_engine(engine, 0, |e| {
        e.mono.resize(frames as usize, 0.0);
        e.inner.context_mut().render(&mut e.mono);
        for (frame, s) in out.chunks_mut(ch).zip(e.mono.iter()) {
            frame.fill(*s);
        }
        frames
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handles_are_harmless() {
        let null = std::ptr::null_mut();
        lobby_start(null, 0);
        lobby_stop(null);
        lobby_poll(null, 100);
        lobby_unlock(null);
        lobby_destroy(null);
        assert_eq!(lobby_state(null), 0);
        let mut buf = [0.0f32; 4];
        assert_eq!(unsafe { lobby_render_interleaved_f32(null, buf.as_mut_ptr(), 2, 2) }, 0);
    }

    #[test]
    fn output_waits_for_the_gesture() {
        let e = lobby_create(8_000.0);
        assert!(!e.is_null());
        lobby_start(e, 0);
        assert_eq!(lobby_state(e), 1);

        let mut buf = vec![1.0f32; 2 * 800];
        assert_eq!(unsafe { lobby_render_interleaved_f32(e, buf.as_mut_ptr(), 800, 2) }, 800);
        assert!(buf.iter().all(|s| *s == 0.0));

        lobby_unlock(e);
        lobby_poll(e, 1_000);
        assert_eq!(lobby_state(e), 2);

        let mut heard = false;
        for step in 0..20u64 {
            unsafe { lobby_render_interleaved_f32(e, buf.as_mut_ptr(), 800, 2) };
            lobby_poll(e, 1_000 + 100 * (step + 1));
            heard |= buf.iter().any(|s| s.abs() > 1e-4);
            assert!(buf.chunks(2).all(|f| f[0] == f[1]));
        }
        assert!(heard);

        lobby_stop(e);
        assert_eq!(lobby_state(e), 3);
        lobby_destroy(e);
    }
}
