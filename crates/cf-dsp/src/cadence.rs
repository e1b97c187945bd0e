//! Cadence Analyzer: onset envelope from frame-to-frame spectral flux
//! (half-wave rectified) and tempo estimation by autocorrelating that
//! envelope for the dominant lag within [40, 240] BPM (spec §4.8).

const MIN_BPM: f32 = 40.0;
const MAX_BPM: f32 = 240.0;

pub struct CadenceAnalyzer {
    sample_rate: u32,
    hop_size: usize,
    prev_spectrum: Vec<f32>,
    onset_envelope: Vec<f32>,
}

impl CadenceAnalyzer {
    pub fn new(sample_rate: u32, hop_size: usize, spectrum_len: usize) -> Self {
        Self {
            sample_rate,
            hop_size,
            prev_spectrum: vec![0.0; spectrum_len],
            onset_envelope: Vec::new(),
        }
    }

    /// Half-wave rectified spectral flux: only positive-going energy
    /// (onsets), frame-to-frame.
    pub fn process(&mut self, magnitude_spectrum: &[f32]) -> f32 {
        let flux: f32 = magnitude_spectrum
            .iter()
            .zip(&self.prev_spectrum)
            .map(|(curr, prev)| (curr - prev).max(0.0))
            .sum();
        self.prev_spectrum.copy_from_slice(magnitude_spectrum);
        self.onset_envelope.push(flux);
        flux
    }

    pub fn onset_envelope(&self) -> &[f32] {
        &self.onset_envelope
    }

    fn frames_per_second(&self) -> f32 {
        self.sample_rate as f32 / self.hop_size as f32
    }

    /// Estimate tempo (BPM) and a normalized rhythm-strength proxy by
    /// autocorrelating the onset envelope and choosing the strongest lag
    /// whose implied tempo falls in [40, 240] BPM.
    pub fn estimate_tempo(&self) -> (f32, f32) {
        estimate_tempo_over(&self.onset_envelope, self.frames_per_second())
    }
}

/// Autocorrelate a caller-supplied slice of the onset envelope (e.g. one
/// restricted to a finalized match window rather than the whole session)
/// for the dominant periodic lag.
pub fn estimate_tempo_over(envelope: &[f32], frames_per_second: f32) -> (f32, f32) {
    let n = envelope.len();
    if n < 4 {
        return (0.0, 0.0);
    }
    let fps = frames_per_second;
    let min_lag = ((60.0 * fps / MAX_BPM).ceil() as usize).max(1);
    let max_lag = ((60.0 * fps / MIN_BPM).floor() as usize).min(n - 1);
    if min_lag >= max_lag {
        return (0.0, 0.0);
    }

    let mean = envelope.iter().sum::<f32>() / n as f32;
    let centered: Vec<f32> = envelope.iter().map(|v| v - mean).collect();
    let zero_lag: f32 = centered.iter().map(|v| v * v).sum();
    if zero_lag <= 0.0 {
        return (0.0, 0.0);
    }

    let mut best_lag = 0usize;
    let mut best_value = f32::MIN;
    for lag in min_lag..=max_lag {
        let corr: f32 = centered[..n - lag]
            .iter()
            .zip(&centered[lag..])
            .map(|(a, b)| a * b)
            .sum();
        if corr > best_value {
            best_value = corr;
            best_lag = lag;
        }
    }

    if best_lag == 0 {
        return (0.0, 0.0);
    }
    let tempo_bpm = 60.0 * fps / best_lag as f32;
    let rhythm_strength = (best_value / zero_lag).clamp(0.0, 1.0);
    (tempo_bpm, rhythm_strength)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_yields_zero_tempo() {
        let mut analyzer = CadenceAnalyzer::new(44100, 256, 257);
        for _ in 0..100 {
            analyzer.process(&vec![0.0; 257]);
        }
        let (bpm, strength) = analyzer.estimate_tempo();
        assert_eq!(bpm, 0.0);
        assert_eq!(strength, 0.0);
    }

    #[test]
    fn periodic_onsets_recover_approximate_tempo() {
        let sample_rate = 44100;
        let hop = 256;
        let mut analyzer = CadenceAnalyzer::new(sample_rate, hop, 257);
        let fps = sample_rate as f32 / hop as f32;
        let target_bpm = 120.0f32;
        let period_frames = (60.0 * fps / target_bpm).round() as usize;

        for i in 0..(period_frames * 20) {
            let spectrum = if i % period_frames == 0 {
                vec![1.0f32; 257]
            } else {
                vec![0.0f32; 257]
            };
            analyzer.process(&spectrum);
        }
        let (bpm, strength) = analyzer.estimate_tempo();
        assert!((bpm - target_bpm).abs() < 10.0, "got {bpm} bpm");
        assert!(strength > 0.3);
    }
}
