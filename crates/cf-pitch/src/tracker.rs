//! Combines the raw YIN detector with median smoothing into the per-hop
//! pitch signal the engine consumes (spec §4.6).

use crate::smoothing::MedianPitchSmoother;
use crate::yin::{YinConfig, YinDetector};
use crate::PitchResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchReading {
    pub raw_hz: f32,
    pub confidence: f32,
    pub smoothed_hz: f32,
}

pub struct PitchTracker {
    detector: YinDetector,
    smoother: MedianPitchSmoother,
    window_size: usize,
}

impl PitchTracker {
    pub fn new(sample_rate: u32, window_size: usize, median_window_frames: usize) -> Self {
        Self {
            detector: YinDetector::new(YinConfig::new(sample_rate, window_size)),
            smoother: MedianPitchSmoother::new(median_window_frames),
            window_size,
        }
    }

    /// The number of trailing raw samples this tracker needs per call.
    /// Callers own the buffering of recent audio and pass a window of
    /// exactly this length (zero-padded at stream start).
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn process(&mut self, window_samples: &[f32]) -> PitchResult<PitchReading> {
        let (raw_hz, confidence) = self.detector.detect(window_samples)?;
        if raw_hz == 0.0 {
            log::debug!("pitch tracker: unvoiced frame");
        }
        let smoothed_hz = self.smoother.push(raw_hz);
        Ok(PitchReading {
            raw_hz,
            confidence,
            smoothed_hz,
        })
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
    fn tracks_stable_pitch() {
        let sr = 44100;
        let mut tracker = PitchTracker::new(sr, 2048, 5);
        let frame = sine(440.0, sr, 2048);
        let mut last = PitchReading {
            raw_hz: 0.0,
            confidence: 0.0,
            smoothed_hz: 0.0,
        };
        for _ in 0..6 {
            last = tracker.process(&frame).unwrap();
        }
        assert!((last.smoothed_hz - 440.0).abs() < 5.0);
    }
}
