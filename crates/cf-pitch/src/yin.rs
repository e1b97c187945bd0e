//! YIN pitch detection (spec §4.6): autocorrelation-style difference
//! function with cumulative mean normalization, parabolic interpolation
//! for sub-sample accuracy, within a configurable frequency range.

use crate::error::{PitchError, PitchResult};

#[derive(Debug, Clone, Copy)]
pub struct YinConfig {
    pub sample_rate: u32,
    pub window_size: usize,
    pub min_freq: f32,
    pub max_freq: f32,
    pub threshold: f32,
}

impl YinConfig {
    pub fn new(sample_rate: u32, window_size: usize) -> Self {
        Self {
            sample_rate,
            window_size,
            min_freq: 50.0,
            max_freq: 1500.0,
            threshold: 0.1,
        }
    }
}

/// Stateless-per-frame YIN detector; holds only scratch buffers sized to
/// the configured window.
pub struct YinDetector {
    config: YinConfig,
    diff_buffer: Vec<f32>,
    cmnd_buffer: Vec<f32>,
}

impl YinDetector {
    pub fn new(config: YinConfig) -> Self {
        let half = config.window_size / 2;
        Self {
            config,
            diff_buffer: vec![0.0; half],
            cmnd_buffer: vec![0.0; half],
        }
    }

    /// Detect `(pitch_hz, confidence)` in `samples`. Returns `(0.0, 0.0)`
    /// for unvoiced frames (spec §4.6: "On unvoiced frames emit
    /// `pitchHz=0, confidence=0`").
    pub fn detect(&mut self, samples: &[f32]) -> PitchResult<(f32, f32)> {
        if samples.len() < self.config.window_size {
            return Err(PitchError::InputTooShort(samples.len(), self.config.window_size));
        }

        self.difference_function(samples);
        self.normalize_difference();

        let lag_floor = (self.config.sample_rate as f32 / self.config.max_freq) as usize;
        let lag_ceiling = ((self.config.sample_rate as f32 / self.config.min_freq) as usize)
            .min(self.cmnd_buffer.len().saturating_sub(1));
        if lag_floor >= lag_ceiling {
            return Ok((0.0, 0.0));
        }

        let chosen = self
            .first_dip_below_threshold(lag_floor, lag_ceiling)
            .or_else(|| self.quietest_lag(lag_floor, lag_ceiling));

        let Some((lag, value)) = chosen else {
            return Ok((0.0, 0.0));
        };
        if value > 0.5 {
            return Ok((0.0, 0.0));
        }

        let refined_lag = self.parabolic_interpolation(lag);
        let frequency = self.config.sample_rate as f32 / refined_lag;
        let confidence = (1.0 - value.min(1.0)).clamp(0.0, 1.0);
        Ok((frequency, confidence))
    }

    /// Squared-difference curve between the first half-window and every
    /// lagged copy of it.
    fn difference_function(&mut self, samples: &[f32]) {
        let half_window = self.config.window_size / 2;
        let reference = &samples[..half_window];
        for (lag, slot) in self.diff_buffer.iter_mut().enumerate() {
            *slot = reference
                .iter()
                .zip(&samples[lag..lag + half_window])
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
        }
    }

    /// Rescales the difference curve by its running mean so that troughs
    /// corresponding to a true period sit near zero regardless of signal
    /// energy (YIN's defining step).
    fn normalize_difference(&mut self) {
        self.cmnd_buffer[0] = 1.0;
        let mut cumulative = 0.0f32;
        for (lag, &d) in self.diff_buffer.iter().enumerate().skip(1) {
            cumulative += d;
            self.cmnd_buffer[lag] = if cumulative > 0.0 {
                d * lag as f32 / cumulative
            } else {
                1.0
            };
        }
    }

    /// Walk forward from `floor` and return the first local minimum whose
    /// value already undercuts the detector's threshold, following the
    /// dip down to its bottom before stopping.
    fn first_dip_below_threshold(&self, floor: usize, ceiling: usize) -> Option<(usize, f32)> {
        let mut lag = floor;
        while lag < ceiling {
            if self.cmnd_buffer[lag] < self.config.threshold {
                let mut trough = lag;
                while trough + 1 < ceiling && self.cmnd_buffer[trough + 1] < self.cmnd_buffer[trough] {
                    trough += 1;
                }
                return Some((trough, self.cmnd_buffer[trough]));
            }
            lag += 1;
        }
        None
    }

    /// Fallback when nothing dips under threshold: the single quietest
    /// lag in range, however weak a candidate it is.
    fn quietest_lag(&self, floor: usize, ceiling: usize) -> Option<(usize, f32)> {
        (floor..ceiling)
            .map(|lag| (lag, self.cmnd_buffer[lag]))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
    }

    fn parabolic_interpolation(&self, lag: usize) -> f32 {
        if lag == 0 || lag >= self.cmnd_buffer.len() - 1 {
            return lag as f32;
        }
        let (prev, here, next) = (
            self.cmnd_buffer[lag - 1],
            self.cmnd_buffer[lag],
            self.cmnd_buffer[lag + 1],
        );
        let denom = 2.0 * (2.0 * here - prev - next);
        let offset = (next - prev) / denom;
        if offset.is_finite() {
            lag as f32 + offset
        } else {
            lag as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq as f64 * i as f64 / sample_rate as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn detects_440hz_sine() {
        let sr = 44100;
        let mut yin = YinDetector::new(YinConfig::new(sr, 1024));
        let frame = sine(440.0, sr, 1024);
        let (hz, conf) = yin.detect(&frame).unwrap();
        assert!((hz - 440.0).abs() < 5.0, "got {hz} Hz");
        assert!(conf > 0.8);
    }

    #[test]
    fn rejects_too_short_input() {
        let mut yin = YinDetector::new(YinConfig::new(44100, 1024));
        assert!(yin.detect(&[0.0; 100]).is_err());
    }

    #[test]
    fn silence_is_unvoiced() {
        let mut yin = YinDetector::new(YinConfig::new(44100, 1024));
        let (hz, conf) = yin.detect(&vec![0.0; 1024]).unwrap();
        assert_eq!(hz, 0.0);
        assert_eq!(conf, 0.0);
    }
}
