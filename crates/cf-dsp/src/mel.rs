//! Mel filterbank and MFCC extraction (spec §4.4).
//!
//! The filterbank depends only on sample rate, band count, frequency
//! bounds, and FFT length, so it is precomputed once per engine and shared
//! read-only across sessions (spec §4.4 invariant, §5 "Shared resources").

const LOG_FLOOR_EPS: f32 = 1e-10;

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// A triangular mel filter expressed as a sparse run of FFT bins with
/// per-bin weights, avoiding a dense `bands x bins` matrix multiply.
#[derive(Debug, Clone)]
struct TriangleFilter {
    start_bin: usize,
    weights: Vec<f32>,
}

/// Precomputed triangular mel filterbank over `[min_freq, max_freq]`.
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    filters: Vec<TriangleFilter>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, fft_len: usize, num_bands: usize, min_freq: f64, max_freq: f64) -> Self {
        let spectrum_len = fft_len / 2 + 1;
        let mel_min = hz_to_mel(min_freq);
        let mel_max = hz_to_mel(max_freq);
        let mel_points: Vec<f64> = (0..num_bands + 2)
            .map(|i| mel_min + (mel_max - mel_min) * i as f64 / (num_bands + 1) as f64)
            .collect();
        let hz_points: Vec<f64> = mel_points.iter().map(|m| mel_to_hz(*m)).collect();
        let bin_points: Vec<usize> = hz_points
            .iter()
            .map(|hz| {
                let bin = (hz * fft_len as f64 / sample_rate as f64).round();
                bin.clamp(0.0, (spectrum_len - 1) as f64) as usize
            })
            .collect();

        let mut filters = Vec::with_capacity(num_bands);
        for m in 0..num_bands {
            let left = bin_points[m];
            let center = bin_points[m + 1];
            let right = bin_points[m + 2];
            let start_bin = left;
            let end_bin = right.max(left);
            let mut weights = Vec::with_capacity(end_bin.saturating_sub(start_bin) + 1);
            for bin in start_bin..=end_bin {
                let w = if bin < center {
                    if center > left {
                        (bin - left) as f32 / (center - left) as f32
                    } else {
                        1.0
                    }
                } else if right > center {
                    (right - bin) as f32 / (right - center) as f32
                } else {
                    1.0
                };
                weights.push(w.max(0.0));
            }
            filters.push(TriangleFilter { start_bin, weights });
        }

        Self { filters }
    }

    pub fn num_bands(&self) -> usize {
        self.filters.len()
    }

    /// Sum power-spectrum energy through each triangular filter.
    pub fn band_energies(&self, power_spectrum: &[f32], out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.filters.len());
        for (band, filter) in self.filters.iter().enumerate() {
            let mut sum = 0.0f32;
            for (i, w) in filter.weights.iter().enumerate() {
                let bin = filter.start_bin + i;
                if bin < power_spectrum.len() {
                    sum += power_spectrum[bin] * w;
                }
            }
            out[band] = sum;
        }
    }
}

/// Precomputed DCT-II basis for turning log mel-band energies into MFCCs.
#[derive(Debug, Clone)]
pub struct Dct {
    basis: Vec<Vec<f32>>, // [coeff][band]
}

impl Dct {
    pub fn new(num_bands: usize, num_coeffs: usize) -> Self {
        let mut basis = Vec::with_capacity(num_coeffs);
        for k in 0..num_coeffs {
            let row: Vec<f32> = (0..num_bands)
                .map(|n| {
                    (std::f64::consts::PI / num_bands as f64 * (n as f64 + 0.5) * k as f64).cos() as f32
                })
                .collect();
            basis.push(row);
        }
        Self { basis }
    }

    pub fn transform(&self, log_energies: &[f32], out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.basis.len());
        for (k, row) in self.basis.iter().enumerate() {
            out[k] = row.iter().zip(log_energies).map(|(b, e)| b * e).sum();
        }
    }
}

/// Per-engine MFCC extractor: mel filterbank + DCT-II, producing one
/// coefficient vector per frame (spec §4.4).
pub struct MfccExtractor {
    filterbank: MelFilterbank,
    dct: Dct,
    num_coeffs: usize,
    band_energy_scratch: Vec<f32>,
    log_energy_scratch: Vec<f32>,
}

impl MfccExtractor {
    pub fn new(sample_rate: u32, fft_len: usize, num_bands: usize, num_coeffs: usize, min_freq: f64, max_freq: f64) -> Self {
        let filterbank = MelFilterbank::new(sample_rate, fft_len, num_bands, min_freq, max_freq);
        let dct = Dct::new(num_bands, num_coeffs);
        Self {
            filterbank,
            dct,
            num_coeffs,
            band_energy_scratch: vec![0.0; num_bands],
            log_energy_scratch: vec![0.0; num_bands],
        }
    }

    pub fn num_coeffs(&self) -> usize {
        self.num_coeffs
    }

    /// `power_spectrum` is `|X|^2` of length `fft_len/2 + 1`.
    pub fn extract(&mut self, power_spectrum: &[f32]) -> Vec<f32> {
        self.filterbank
            .band_energies(power_spectrum, &mut self.band_energy_scratch);
        for (o, e) in self.log_energy_scratch.iter_mut().zip(&self.band_energy_scratch) {
            *o = (e + LOG_FLOOR_EPS).ln();
        }
        let mut coeffs = vec![0.0f32; self.num_coeffs];
        self.dct.transform(&self.log_energy_scratch, &mut coeffs);
        coeffs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filterbank_weights_are_nonnegative() {
        let fb = MelFilterbank::new(44100, 512, 26, 0.0, 22050.0);
        assert_eq!(fb.num_bands(), 26);
    }

    #[test]
    fn mfcc_is_deterministic() {
        let mut extractor = MfccExtractor::new(44100, 512, 26, 13, 0.0, 8000.0);
        let spectrum = vec![1.0f32; 257];
        let a = extractor.extract(&spectrum);
        let b = extractor.extract(&spectrum);
        assert_eq!(a, b);
        assert_eq!(a.len(), 13);
    }

    #[test]
    fn silence_yields_finite_coeffs() {
        let mut extractor = MfccExtractor::new(44100, 512, 26, 13, 0.0, 8000.0);
        let spectrum = vec![0.0f32; 257];
        let coeffs = extractor.extract(&spectrum);
        assert!(coeffs.iter().all(|c| c.is_finite()));
    }
}
