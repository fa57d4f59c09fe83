//! State-variable filter used for the percussion voices.
//!
//! `StateVariable` is a TPT (topology-preserving transform) SVF:
//! - `g = tan(π fc / sr)`, `R = 1 / (2Q)`
//! - stable under per-sample cutoff modulation
//! - one instance yields low/band/high taps; `Response` picks one
//!
//! Coefficients are only recomputed when cutoff or Q actually change, so a
//! renderer can push its parameter values every sample.

use crate::dsp::{kill_denormals, tpt_g};

/// Which tap of the filter is returned.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Response {
    Lowpass,
    Highpass,
    Bandpass,
}

/// All three taps for one input sample.
#[derive(Copy, Clone, Debug, Default)]
pub struct Taps {
    pub low: f32,
    pub band: f32,
    pub high: f32,
}

impl Taps {
    #[inline]
    pub fn pick(&self, response: Response) -> f32 {
        match response {
            Response::Lowpass => self.low,
            Response::Highpass => self.high,
            Response::Bandpass => self.band,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct StateVariable {
    response: Response,
    sr: f32,
    cut: f32,
    q: f32,
    g: f32,
    r: f32,
    s1: f32,
    s2: f32,
}

impl StateVariable {
    pub fn new(response: Response, cut_hz: f32, q: f32, sr: f32) -> Self {
        let mut f = Self {
            response,
            sr: sr.max(1.0),
            cut: cut_hz.max(0.0),
            q: q.max(1e-4),
            g: 0.0,
            r: 0.0,
            s1: 0.0,
            s2: 0.0,
        };
        f.recalc();
        f
    }

    /// Update cutoff and Q; cheap when nothing changed.
    #[inline]
    pub fn set(&mut self, cut_hz: f32, q: f32) {
        let cut = cut_hz.max(0.0);
        let q = q.max(1e-4);
        if cut != self.cut || q != self.q {
            self.cut = cut;
            self.q = q;
            self.recalc();
        }
    }

    #[inline]
    fn recalc(&mut self) {
        self.g = tpt_g(self.cut, self.sr);
        self.r = 1.0 / (2.0 * self.q);
    }

    /// Run one sample through the filter and return every tap.
    #[inline]
    pub fn taps(&mut self, x: f32) -> Taps {
        // Zavalishin, "The Art of VA Filter Design", ch. 4.
        let g = self.g;
        let high = (x - (2.0 * self.r + g) * self.s1 - self.s2) / (1.0 + 2.0 * self.r * g + g * g);
        let band = g * high + self.s1;
        self.s1 = kill_denormals(g * high + band);
        let low = g * band + self.s2;
        self.s2 = kill_denormals(g * band + low);
        // Band tap normalised to unity gain at the centre frequency.
        Taps { low, band: 2.0 * self.r * band, high }
    }

    /// Run one sample and return the configured response.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let response = self.response;
        self.taps(x).pick(response)
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::TAU;

    fn rms_of_sine(filter: &mut StateVariable, hz: f32, sr: f32) -> f32 {
        let n = sr as usize / 4;
        let mut acc = 0.0;
        for i in 0..n {
            let x = (TAU * hz * i as f32 / sr).sin();
            let y = filter.process(x);
            if i > n / 2 {
                acc += y * y;
            }
        }
        (acc / (n / 2) as f32).sqrt()
    }

    #[test]
    fn highpass_blocks_dc() {
        let sr = 48_000.0;
        let mut hp = StateVariable::new(Response::Highpass, 7000.0, 0.707, sr);
        let mut y = 1.0;
        for _ in 0..(sr as usize / 10) {
            y = hp.process(1.0);
        }
        assert!(y.abs() < 1e-3, "y={y}");
    }

    #[test]
    fn highpass_passes_bright_content_over_dull() {
        let sr = 48_000.0;
        let bright = rms_of_sine(&mut StateVariable::new(Response::Highpass, 7000.0, 0.707, sr), 12_000.0, sr);
        let dull = rms_of_sine(&mut StateVariable::new(Response::Highpass, 7000.0, 0.707, sr), 500.0, sr);
        assert!(bright > 10.0 * dull, "bright={bright} dull={dull}");
    }

    #[test]
    fn bandpass_peaks_at_center() {
        let sr = 48_000.0;
        let center = rms_of_sine(&mut StateVariable::new(Response::Bandpass, 1800.0, 0.6, sr), 1800.0, sr);
        let far = rms_of_sine(&mut StateVariable::new(Response::Bandpass, 1800.0, 0.6, sr), 60.0, sr);
        assert!(center > far, "center={center} far={far}");
    }

    #[test]
    fn set_is_idempotent_for_same_values() {
        let mut f = StateVariable::new(Response::Lowpass, 1000.0, 0.707, 48_000.0);
        let before = f.g;
        f.set(1000.0, 0.707);
        assert_eq!(f.g, before);
        f.set(2000.0, 0.707);
        assert!(f.g > before);
    }
}
