//! Harmonic Analyzer: spectral centroid, 85% rolloff, flatness, and a
//! harmonic-ratio proxy from the magnitude spectrum (spec §4.7).
//!
//! Per the spec's open question (§9 "Spectral-centroid mapping"),
//! `spectral_centroid` here is a genuine magnitude-weighted mean frequency
//! in Hz, never the harmonic-confidence value.

const ROLLOFF_THRESHOLD: f32 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HarmonicReading {
    pub spectral_centroid_hz: f32,
    pub spectral_rolloff_hz: f32,
    pub spectral_flatness: f32,
    pub harmonic_ratio: f32,
}

/// Bin index -> Hz for a magnitude spectrum of `spectrum_len = fft_len/2+1`.
fn bin_to_hz(bin: usize, sample_rate: u32, spectrum_len: usize) -> f32 {
    bin as f32 * sample_rate as f32 / (2.0 * (spectrum_len - 1) as f32)
}

pub struct HarmonicAnalyzer {
    sample_rate: u32,
    centroid_sum: f64,
    rolloff_sum: f64,
    flatness_sum: f64,
    harmonic_sum: f64,
    count: u64,
}

impl HarmonicAnalyzer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            centroid_sum: 0.0,
            rolloff_sum: 0.0,
            flatness_sum: 0.0,
            harmonic_sum: 0.0,
            count: 0,
        }
    }

    /// Analyze one frame's magnitude spectrum; `pitch_hz` (0 if unvoiced)
    /// anchors the harmonic-ratio proxy against estimated F0.
    pub fn analyze(&mut self, magnitude_spectrum: &[f32], pitch_hz: f32) -> HarmonicReading {
        let centroid = self.spectral_centroid(magnitude_spectrum);
        let rolloff = self.spectral_rolloff(magnitude_spectrum);
        let flatness = spectral_flatness(magnitude_spectrum);
        let harmonic_ratio = self.harmonic_ratio(magnitude_spectrum, pitch_hz);

        self.centroid_sum += centroid as f64;
        self.rolloff_sum += rolloff as f64;
        self.flatness_sum += flatness as f64;
        self.harmonic_sum += harmonic_ratio as f64;
        self.count += 1;

        HarmonicReading {
            spectral_centroid_hz: centroid,
            spectral_rolloff_hz: rolloff,
            spectral_flatness: flatness,
            harmonic_ratio,
        }
    }

    pub fn running_means(&self) -> HarmonicReading {
        if self.count == 0 {
            return HarmonicReading {
                spectral_centroid_hz: 0.0,
                spectral_rolloff_hz: 0.0,
                spectral_flatness: 0.0,
                harmonic_ratio: 0.0,
            };
        }
        let n = self.count as f64;
        HarmonicReading {
            spectral_centroid_hz: (self.centroid_sum / n) as f32,
            spectral_rolloff_hz: (self.rolloff_sum / n) as f32,
            spectral_flatness: (self.flatness_sum / n) as f32,
            harmonic_ratio: (self.harmonic_sum / n) as f32,
        }
    }

    fn spectral_centroid(&self, spectrum: &[f32]) -> f32 {
        let mut weighted_sum = 0.0f64;
        let mut magnitude_sum = 0.0f64;
        for (k, &m) in spectrum.iter().enumerate() {
            let freq = bin_to_hz(k, self.sample_rate, spectrum.len()) as f64;
            weighted_sum += freq * m as f64;
            magnitude_sum += m as f64;
        }
        if magnitude_sum > 0.0 {
            (weighted_sum / magnitude_sum) as f32
        } else {
            0.0
        }
    }

    fn spectral_rolloff(&self, spectrum: &[f32]) -> f32 {
        let total_energy: f64 = spectrum.iter().map(|m| (*m as f64) * (*m as f64)).sum();
        if total_energy <= 0.0 {
            return 0.0;
        }
        let threshold = ROLLOFF_THRESHOLD as f64 * total_energy;
        let mut cumulative = 0.0f64;
        for (k, &m) in spectrum.iter().enumerate() {
            cumulative += (m as f64) * (m as f64);
            if cumulative >= threshold {
                return bin_to_hz(k, self.sample_rate, spectrum.len());
            }
        }
        (self.sample_rate / 2) as f32
    }

    /// Energy at integer multiples of the estimated F0 versus total energy.
    fn harmonic_ratio(&self, spectrum: &[f32], pitch_hz: f32) -> f32 {
        if pitch_hz <= 0.0 {
            return 0.0;
        }
        let total_energy: f64 = spectrum.iter().map(|m| (*m as f64) * (*m as f64)).sum();
        if total_energy <= 0.0 {
            return 0.0;
        }
        let bin_hz = self.sample_rate as f64 / (2.0 * (spectrum.len() - 1) as f64);
        let mut harmonic_energy = 0.0f64;
        let mut harmonic = 1;
        loop {
            let freq = pitch_hz as f64 * harmonic as f64;
            if freq > self.sample_rate as f64 / 2.0 {
                break;
            }
            let bin = (freq / bin_hz).round() as usize;
            // include a one-bin window around the harmonic to tolerate jitter
            for b in bin.saturating_sub(1)..=(bin + 1).min(spectrum.len() - 1) {
                harmonic_energy += (spectrum[b] as f64) * (spectrum[b] as f64);
            }
            harmonic += 1;
        }
        (harmonic_energy / total_energy).min(1.0) as f32
    }
}

/// Ratio of geometric mean to arithmetic mean of the magnitude spectrum;
/// near 0 for tonal signals, near 1 for noise-like spectra.
pub fn spectral_flatness(spectrum: &[f32]) -> f32 {
    let nonzero: Vec<f64> = spectrum.iter().map(|m| (*m as f64) + 1e-12).collect();
    if nonzero.is_empty() {
        return 0.0;
    }
    let log_sum: f64 = nonzero.iter().map(|v| v.ln()).sum();
    let geo_mean = (log_sum / nonzero.len() as f64).exp();
    let arith_mean: f64 = nonzero.iter().sum::<f64>() / nonzero.len() as f64;
    if arith_mean > 0.0 {
        (geo_mean / arith_mean).min(1.0) as f32
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_spectrum(bin: usize, len: usize) -> Vec<f32> {
        let mut spectrum = vec![0.0f32; len];
        spectrum[bin] = 1.0;
        spectrum
    }

    #[test]
    fn centroid_of_pure_tone_matches_bin_frequency() {
        let mut analyzer = HarmonicAnalyzer::new(44100);
        let spectrum = sine_spectrum(10, 257);
        let reading = analyzer.analyze(&spectrum, 0.0);
        let expected = bin_to_hz(10, 44100, 257);
        assert!((reading.spectral_centroid_hz - expected).abs() < 1.0);
    }

    #[test]
    fn flatness_of_single_bin_is_near_zero() {
        let spectrum = sine_spectrum(10, 257);
        assert!(spectral_flatness(&spectrum) < 0.1);
    }

    #[test]
    fn flatness_of_white_noise_spectrum_is_near_one() {
        let spectrum = vec![1.0f32; 257];
        assert!(spectral_flatness(&spectrum) > 0.9);
    }

    #[test]
    fn harmonic_ratio_of_zero_pitch_is_zero() {
        let mut analyzer = HarmonicAnalyzer::new(44100);
        let spectrum = sine_spectrum(10, 257);
        assert_eq!(analyzer.analyze(&spectrum, 0.0).harmonic_ratio, 0.0);
    }

    #[test]
    fn running_means_average_across_frames() {
        let mut analyzer = HarmonicAnalyzer::new(44100);
        analyzer.analyze(&sine_spectrum(10, 257), 0.0);
        analyzer.analyze(&sine_spectrum(20, 257), 0.0);
        let means = analyzer.running_means();
        assert!(means.spectral_centroid_hz > 0.0);
    }
}
