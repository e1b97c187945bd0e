//! Precomputed analysis window (spec §4.3). Engine-level, read-only after
//! construction, shared across all sessions using the same `frame_size`.

use std::f64::consts::PI;

/// A Hann window of a fixed length, precomputed once.
#[derive(Debug, Clone)]
pub struct HannWindow {
    coeffs: Vec<f32>,
}

impl HannWindow {
    pub fn new(len: usize) -> Self {
        let coeffs = (0..len)
            .map(|n| {
                if len <= 1 {
                    1.0
                } else {
                    0.5 - 0.5 * (2.0 * PI * n as f64 / (len as f64 - 1.0)).cos()
                }
            })
            .map(|v| v as f32)
            .collect();
        Self { coeffs }
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Multiply `frame` in place by the window. Panics if lengths differ,
    /// which would indicate a caller bug (frame size mismatch).
    pub fn apply(&self, frame: &[f32], out: &mut [f32]) {
        debug_assert_eq!(frame.len(), self.coeffs.len());
        debug_assert_eq!(out.len(), self.coeffs.len());
        for ((o, s), w) in out.iter_mut().zip(frame).zip(&self.coeffs) {
            *o = s * w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_endpoints_are_zero() {
        let w = HannWindow::new(8);
        assert!(w.coeffs[0].abs() < 1e-6);
        assert!((w.coeffs[7]).abs() < 1e-6);
    }

    #[test]
    fn hann_midpoint_is_near_one() {
        let w = HannWindow::new(9);
        assert!((w.coeffs[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn deterministic_across_constructions() {
        let a = HannWindow::new(512);
        let b = HannWindow::new(512);
        assert_eq!(a.coeffs, b.coeffs);
    }
}
