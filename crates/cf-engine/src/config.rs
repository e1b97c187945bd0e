//! Engine-wide, immutable configuration (spec §3).

use std::path::PathBuf;

use cf_dsp::VadConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub master_calls_path: PathBuf,
    pub default_sample_rate: u32,
    pub frame_size: usize,
    pub hop_size: usize,
    pub mfcc_coeffs: usize,
    pub mel_bands: usize,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub enhanced_analysis_default: bool,

    /// Median smoothing window, in frames, for the pitch trajectory
    /// (spec §4.6 names 5 as the example default).
    pub pitch_median_window: usize,
    /// VAD hysteresis thresholds (spec §9 open question: exposed as
    /// config with the defaults named in §4).
    pub vad: VadConfig,
    /// Minimum frames before readiness/finalize can be asserted (spec
    /// §4.9 "R_min", §4.10 "e.g. 25").
    pub min_frames_for_readiness: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            master_calls_path: PathBuf::from("."),
            default_sample_rate: 44_100,
            frame_size: 512,
            hop_size: 256,
            mfcc_coeffs: 13,
            mel_bands: 26,
            min_frequency: 0.0,
            max_frequency: 8_000.0,
            enhanced_analysis_default: true,
            pitch_median_window: 5,
            vad: VadConfig::default(),
            min_frames_for_readiness: 25,
        }
    }
}

impl EngineConfig {
    /// The sample window YIN needs to resolve down to its minimum
    /// frequency (50 Hz, spec §4.6), rounded up to a power of two and
    /// never smaller than `frame_size`.
    pub fn pitch_window_size(&self, sample_rate: u32) -> usize {
        let min_pitch_hz = 50.0f32;
        let needed = (sample_rate as f32 / min_pitch_hz * 2.0).ceil() as usize;
        needed.max(self.frame_size).next_power_of_two()
    }
}
