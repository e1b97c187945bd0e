//! Per-session frame pipeline: fans a windowed frame out to MFCC, Level,
//! VAD, and Harmonic analysis, and feeds the Cadence analyzer's onset
//! detector (spec §2 "Data flow").

use cf_core::Sample;

use crate::cadence::CadenceAnalyzer;
use crate::fft::RealFft;
use crate::harmonic::{HarmonicAnalyzer, HarmonicReading};
use crate::level::{LevelDetector, LevelReading};
use crate::mel::MfccExtractor;
use crate::vad::{zero_crossing_rate, VadConfig, VadDecision, VoiceActivityDetector};
use crate::window::HannWindow;

/// Configuration shared by every session's pipeline (mirrors the relevant
/// fields of spec §3's `EngineConfig`).
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub hop_size: usize,
    pub mel_bands: usize,
    pub mfcc_coeffs: usize,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub vad: VadConfig,
}

/// Everything produced for a single frame, fanned out across the
/// detectors (spec §2).
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub mfcc: Vec<f32>,
    pub level: LevelReading,
    pub vad: VadDecision,
    pub pitch_hz: f32,
    pub pitch_confidence: f32,
    pub harmonic: HarmonicReading,
    pub onset: f32,
}

/// Shared, read-only engine-level tables (window, FFT plan instance
/// parameters, mel filterbank params) are held per-pipeline since each
/// session owns its own `RealFft`/`MfccExtractor` scratch state; the
/// *coefficients* (Hann window shape, filterbank geometry) are identical
/// across sessions with the same config, matching spec §5's "Shared
/// resources" note in spirit even though each session gets its own
/// instance for simplicity and lock-free per-session mutation.
pub struct FramePipeline {
    window: HannWindow,
    fft: RealFft,
    mfcc: MfccExtractor,
    level: LevelDetector,
    vad: VoiceActivityDetector,
    harmonic: HarmonicAnalyzer,
    cadence: CadenceAnalyzer,
    windowed_scratch: Vec<f32>,
    spectrum_scratch: Vec<f32>,
    power_scratch: Vec<f32>,
}

impl FramePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let fft = RealFft::new(config.frame_size);
        let spectrum_len = fft.spectrum_len();
        Self {
            window: HannWindow::new(config.frame_size),
            fft,
            mfcc: MfccExtractor::new(
                config.sample_rate,
                config.frame_size,
                config.mel_bands,
                config.mfcc_coeffs,
                config.min_frequency,
                config.max_frequency,
            ),
            level: LevelDetector::new(),
            vad: VoiceActivityDetector::new(config.vad),
            harmonic: HarmonicAnalyzer::new(config.sample_rate),
            cadence: CadenceAnalyzer::new(config.sample_rate, config.hop_size, spectrum_len),
            windowed_scratch: vec![0.0; config.frame_size],
            spectrum_scratch: vec![0.0; spectrum_len],
            power_scratch: vec![0.0; spectrum_len],
        }
    }

    pub fn has_ever_been_voiced(&self) -> bool {
        self.vad.has_ever_been_voiced()
    }

    pub fn onset_envelope(&self) -> &[f32] {
        self.cadence.onset_envelope()
    }

    pub fn estimate_tempo(&self) -> (f32, f32) {
        self.cadence.estimate_tempo()
    }

    pub fn harmonic_running_means(&self) -> HarmonicReading {
        self.harmonic.running_means()
    }

    /// Process one frame, returning every per-frame signal. Pitch must be
    /// supplied by the caller (cf-pitch lives in a separate crate to keep
    /// cf-dsp free of the YIN implementation detail); pass `(0.0, 0.0)`
    /// before pitch tracking is wired up.
    pub fn process(&mut self, frame: &[Sample], pitch_hz: f32, pitch_confidence: f32) -> FrameAnalysis {
        self.window.apply(frame, &mut self.windowed_scratch);
        self.fft
            .magnitude_spectrum(&self.windowed_scratch, &mut self.spectrum_scratch);
        for (p, m) in self.power_scratch.iter_mut().zip(&self.spectrum_scratch) {
            *p = m * m;
        }

        let mfcc = self.mfcc.extract(&self.power_scratch);
        let level = self.level.process(frame);
        let zcr = zero_crossing_rate(frame);
        let harmonic = self.harmonic.analyze(&self.spectrum_scratch, pitch_hz);
        let vad = self.vad.process(level.rms, zcr, harmonic.spectral_centroid_hz);
        let onset = self.cadence.process(&self.spectrum_scratch);

        FrameAnalysis {
            mfcc,
            level,
            vad,
            pitch_hz,
            pitch_confidence,
            harmonic,
            onset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> PipelineConfig {
        PipelineConfig {
            sample_rate: 44100,
            frame_size: 512,
            hop_size: 256,
            mel_bands: 26,
            mfcc_coeffs: 13,
            min_frequency: 0.0,
            max_frequency: 8000.0,
            vad: VadConfig::default(),
        }
    }

    #[test]
    fn processes_a_frame_without_panicking() {
        let mut pipeline = FramePipeline::new(default_config());
        let frame: Vec<f32> = (0..512)
            .map(|i| (2.0 * std::f64::consts::PI * 440.0 * i as f64 / 44100.0).sin() as f32 * 0.3)
            .collect();
        let analysis = pipeline.process(&frame, 440.0, 0.9);
        assert_eq!(analysis.mfcc.len(), 13);
        assert!(analysis.level.rms > 0.0);
    }

    #[test]
    fn deterministic_for_same_input() {
        let mut a = FramePipeline::new(default_config());
        let mut b = FramePipeline::new(default_config());
        let frame: Vec<f32> = (0..512).map(|i| (i as f32 * 0.01).sin() * 0.3).collect();
        let ra = a.process(&frame, 220.0, 0.8);
        let rb = b.process(&frame, 220.0, 0.8);
        assert_eq!(ra.mfcc, rb.mfcc);
    }
}
