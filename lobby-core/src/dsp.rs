//! Math backend and small DSP helpers.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - One place that decides which math backend the crate uses
//! - Optional `fast-math` approximations for the per-sample hot paths
//! - Side-effect free helpers that are easy to test
//!
//! Conventions:
//! - Audio values are `f32`; clock values elsewhere in the workspace are `f64`.
//! - Argument and return domains are documented per function.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    if #[cfg(feature = "micromath")] {
        use micromath::F32Ext as _;
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] fn m_tan(x: f32) -> f32 { x.sin() / x.cos() }
    } else if #[cfg(feature = "no-std")] {
        #[inline] fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] fn m_ln(x: f32) -> f32 { libm::logf(x) }
        #[inline] fn m_tan(x: f32) -> f32 { libm::tanf(x) }
    } else {
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] fn m_tan(x: f32) -> f32 { x.tan() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π
pub const TAU: f32 = 2.0 * PI;

/// Values below this magnitude are flushed to zero.
pub const EPS_SMALL: f32 = 1.0e-20;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo { lo } else if x > hi { hi } else { x }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Wrap a phase into [0, 1). Works for negative phases (deep FM can run the
/// instantaneous frequency below zero).
#[inline]
pub fn wrap01(p: f32) -> f32 {
    let w = p - (p as i64) as f32;
    if w < 0.0 { w + 1.0 } else if w >= 1.0 { w - 1.0 } else { w }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x > -EPS_SMALL && x < EPS_SMALL { 0.0 } else { x }
}

/// `2^x`. Exact for `x == 0`, which the equal-temperament reference pitch relies on.
#[inline]
pub fn exp2(x: f32) -> f32 {
    if x == 0.0 {
        return 1.0;
    }
    cfg_if! {
        if #[cfg(any(feature = "micromath", feature = "no-std"))] {
            m_exp(x * core::f32::consts::LN_2)
        } else {
            x.exp2()
        }
    }
}

/// Exponential interpolation `from * (to / from)^t`, `t` clamped to [0, 1].
///
/// Both endpoints must be non-zero and share a sign; otherwise `from` is held,
/// matching the usual audio-parameter rule for exponential ramps.
#[inline]
pub fn exp_interp(from: f32, to: f32, t: f32) -> f32 {
    if from == 0.0 || to == 0.0 || (from < 0.0) != (to < 0.0) {
        return from;
    }
    from * m_exp(clamp(t, 0.0, 1.0) * m_ln(to / from))
}

// --------------------------------- Fast trig -------------------------------------

/// Sine of an angle in radians.
/// With `fast-math` the argument is range-reduced into [-π, π] and evaluated
/// with a 5th-order odd polynomial (max abs error ~1e-3).
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let k = (x / TAU + if x >= 0.0 { 0.5 } else { -0.5 }) as i64 as f32;
            let xr = x - k * TAU;
            let x2 = xr * xr;
            xr * (0.999_979_313_3 + x2 * (-0.166_624_432_0 + x2 * 0.008_308_978_98))
        } else {
            m_sin(x)
        }
    }
}

/// TPT `g = tan(π fc / sr)` for state-variable filters.
/// The cutoff is kept just under Nyquist so `g` stays finite.
#[inline]
pub fn tpt_g(cut_hz: f32, sr: f32) -> f32 {
    let fc = clamp(cut_hz, 0.0, 0.499 * sr);
    m_tan(PI * (fc / sr))
}

// --------------------------------- Tests (std only) ------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_respects_both_bounds() {
        assert_eq!(clamp(-0.5, 0.0, 1.0), 0.0);
        assert_eq!(clamp(1.5, 0.0, 1.0), 1.0);
        assert_eq!(clamp(0.25, 0.0, 1.0), 0.25);
    }

    #[test]
    fn wrap01_handles_negative_phase() {
        assert!((wrap01(1.25) - 0.25).abs() < 1e-6);
        assert!((wrap01(-0.25) - 0.75).abs() < 1e-6);
        let w = wrap01(-3.0);
        assert!((0.0..1.0).contains(&w), "w={w}");
    }

    #[test]
    fn exp_interp_hits_endpoints_and_geometric_midpoint() {
        assert!((exp_interp(0.0001, 0.12, 0.0) - 0.0001).abs() < 1e-9);
        assert!((exp_interp(0.0001, 0.12, 1.0) - 0.12).abs() < 1e-5);
        let mid = exp_interp(1.0, 100.0, 0.5);
        assert!((mid - 10.0).abs() < 1e-3, "mid={mid}");
    }

    #[test]
    fn exp_interp_holds_across_zero() {
        assert_eq!(exp_interp(0.5, 0.0, 0.5), 0.5);
        assert_eq!(exp_interp(0.5, -0.5, 0.5), 0.5);
    }

    #[test]
    fn exp2_is_exact_at_zero() {
        assert_eq!(exp2(0.0), 1.0);
        assert!((exp2(1.0) - 2.0).abs() < 1e-6);
    }
}
