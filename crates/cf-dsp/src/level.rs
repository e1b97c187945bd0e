//! Level Detector: per-frame RMS, peak, and an EMA-smoothed "integrated"
//! loudness proxy (spec §4.5). Simplified — not full ITU BS.1770.

use cf_core::Sample;

/// Per-frame level reading.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LevelReading {
    pub rms: f32,
    pub peak: f32,
    pub integrated: f32,
    pub clipped: bool,
}

/// Tracks RMS/peak/integrated-loudness across frames for one session.
#[derive(Debug, Clone)]
pub struct LevelDetector {
    integrated_ema: f32,
    ema_coeff: f32,
    clip_threshold: f32,
    consecutive_clipped: u32,
    clip_run_min: u32,
}

impl LevelDetector {
    pub fn new() -> Self {
        Self {
            integrated_ema: 0.0,
            ema_coeff: 0.1,
            clip_threshold: 0.99,
            consecutive_clipped: 0,
            clip_run_min: 3,
        }
    }

    /// Process one frame and update the running integrated-loudness EMA.
    pub fn process(&mut self, frame: &[Sample]) -> LevelReading {
        if frame.is_empty() {
            return LevelReading {
                rms: 0.0,
                peak: 0.0,
                integrated: self.integrated_ema,
                clipped: false,
            };
        }
        let sum_sq: f32 = frame.iter().map(|s| s * s).sum();
        let rms = (sum_sq / frame.len() as f32).sqrt();
        let peak = frame.iter().fold(0.0f32, |a, s| a.max(s.abs()));

        self.integrated_ema = self.integrated_ema * (1.0 - self.ema_coeff) + rms * self.ema_coeff;

        if peak >= self.clip_threshold {
            self.consecutive_clipped += 1;
        } else {
            self.consecutive_clipped = 0;
        }
        let clipped = self.consecutive_clipped >= self.clip_run_min;

        LevelReading {
            rms,
            peak,
            integrated: self.integrated_ema,
            clipped,
        }
    }
}

impl Default for LevelDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a linear amplitude to dBFS, floored to avoid `-inf`.
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    20.0 * amplitude.max(1e-10).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_zero_rms_and_peak() {
        let mut det = LevelDetector::new();
        let reading = det.process(&vec![0.0; 512]);
        assert_eq!(reading.rms, 0.0);
        assert_eq!(reading.peak, 0.0);
        assert!(!reading.clipped);
    }

    #[test]
    fn full_scale_sine_reports_high_rms() {
        let mut det = LevelDetector::new();
        let frame: Vec<f32> = (0..512)
            .map(|i| (2.0 * std::f64::consts::PI * 10.0 * i as f64 / 512.0).sin() as f32)
            .collect();
        let reading = det.process(&frame);
        assert!(reading.rms > 0.6 && reading.rms < 0.75);
        assert!(reading.peak > 0.99);
    }

    #[test]
    fn sustained_clipping_is_flagged() {
        let mut det = LevelDetector::new();
        let frame = vec![1.0f32; 64];
        let mut last = det.process(&frame);
        for _ in 0..4 {
            last = det.process(&frame);
        }
        assert!(last.clipped);
    }

    #[test]
    fn integrated_loudness_tracks_toward_rms() {
        let mut det = LevelDetector::new();
        let frame = vec![0.5f32; 512];
        let mut reading = det.process(&frame);
        for _ in 0..200 {
            reading = det.process(&frame);
        }
        assert!((reading.integrated - 0.5).abs() < 0.01);
    }
}
