//! Real-input FFT producing magnitude (and phase, where needed) spectra
//! (spec §4.3). Same input bytes yield bit-stable magnitude spectra across
//! runs on the same platform (`realfft`/`rustfft` are pure scalar/SIMD
//! deterministic transforms, no RNG or uninitialized state involved).

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::Arc;

/// Wraps a single real-to-complex FFT plan of a fixed length, shared
/// engine-wide (spec §5: "Precomputed Hann window, FFT plan, and mel
/// filterbank are engine-level, read-only after construction").
pub struct RealFft {
    fft: Arc<dyn RealToComplex<f32>>,
    len: usize,
    scratch: Vec<Complex<f32>>,
    input_buf: Vec<f32>,
}

impl RealFft {
    pub fn new(len: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(len);
        let scratch = fft.make_scratch_vec();
        let input_buf = fft.make_input_vec();
        Self {
            fft,
            len,
            scratch,
            input_buf,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Spectrum length for a real input of this FFT's length (`len/2 + 1`).
    pub fn spectrum_len(&self) -> usize {
        self.len / 2 + 1
    }

    /// Transform a windowed, real-valued `frame` (length == `len`) into a
    /// magnitude spectrum of length `spectrum_len()`.
    pub fn magnitude_spectrum(&mut self, frame: &[f32], out: &mut [f32]) {
        debug_assert_eq!(frame.len(), self.len);
        debug_assert_eq!(out.len(), self.spectrum_len());
        self.input_buf.copy_from_slice(frame);
        let mut spectrum = vec![Complex::new(0.0, 0.0); self.spectrum_len()];
        self.fft
            .process_with_scratch(&mut self.input_buf, &mut spectrum, &mut self.scratch)
            .expect("realfft process failed");
        for (o, c) in out.iter_mut().zip(spectrum.iter()) {
            *o = c.norm();
        }
    }

    /// Transform into complex bins directly, for callers needing phase
    /// (e.g. a phase-vocoder-style pitch tracker).
    pub fn complex_spectrum(&mut self, frame: &[f32]) -> Vec<Complex<f32>> {
        debug_assert_eq!(frame.len(), self.len);
        self.input_buf.copy_from_slice(frame);
        let mut spectrum = vec![Complex::new(0.0, 0.0); self.spectrum_len()];
        self.fft
            .process_with_scratch(&mut self.input_buf, &mut spectrum, &mut self.scratch)
            .expect("realfft process failed");
        spectrum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_peak_is_at_expected_bin() {
        let n = 512;
        let mut fft = RealFft::new(n);
        let freq_bin = 20usize;
        let frame: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq_bin as f64 * i as f64 / n as f64).sin() as f32)
            .collect();
        let mut mag = vec![0.0f32; fft.spectrum_len()];
        fft.magnitude_spectrum(&frame, &mut mag);
        let peak = mag
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(peak, freq_bin);
    }

    #[test]
    fn deterministic_across_runs() {
        let n = 256;
        let frame: Vec<f32> = (0..n).map(|i| (i as f32 * 0.01).sin()).collect();
        let mut fft_a = RealFft::new(n);
        let mut fft_b = RealFft::new(n);
        let mut out_a = vec![0.0f32; fft_a.spectrum_len()];
        let mut out_b = vec![0.0f32; fft_b.spectrum_len()];
        fft_a.magnitude_spectrum(&frame, &mut out_a);
        fft_b.magnitude_spectrum(&frame, &mut out_b);
        assert_eq!(out_a, out_b);
    }
}
