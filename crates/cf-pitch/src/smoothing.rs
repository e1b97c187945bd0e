//! Median smoothing of a per-frame pitch trajectory to reject single-frame
//! outliers before aggregation (spec §4.6).

use std::collections::VecDeque;

pub struct MedianPitchSmoother {
    window: VecDeque<f32>,
    size: usize,
    scratch: Vec<f32>,
}

impl MedianPitchSmoother {
    pub fn new(window_frames: usize) -> Self {
        let size = window_frames.max(1);
        Self {
            window: VecDeque::with_capacity(size),
            size,
            scratch: Vec::with_capacity(size),
        }
    }

    /// Push the next raw pitch reading (0.0 for unvoiced) and return the
    /// median of the trailing window.
    pub fn push(&mut self, pitch_hz: f32) -> f32 {
        if self.window.len() == self.size {
            self.window.pop_front();
        }
        self.window.push_back(pitch_hz);

        self.scratch.clear();
        self.scratch.extend(self.window.iter().copied());
        self.scratch
            .sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        self.scratch[self.scratch.len() / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_rejects_single_frame_outlier() {
        let mut smoother = MedianPitchSmoother::new(5);
        for hz in [440.0, 440.0, 440.0, 440.0] {
            smoother.push(hz);
        }
        let result = smoother.push(2000.0); // one wild outlier
        assert!((result - 440.0).abs() < 1.0);
    }

    #[test]
    fn median_of_empty_is_first_value() {
        let mut smoother = MedianPitchSmoother::new(5);
        assert_eq!(smoother.push(100.0), 100.0);
    }
}
