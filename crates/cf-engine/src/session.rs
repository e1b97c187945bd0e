//! Per-session state: master reference data, the growing user feature
//! trails, and the incremental DTW working set (spec §3).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use cf_core::{EngineError, EngineResult, Grade, MasterAudio, SessionId};
use cf_dsp::{
    FrameAnalysis, FramePipeline, HarmonicReading, LevelReading, PipelineConfig, VadDecision,
};
use cf_pitch::{PitchReading, PitchTracker};

use crate::config::EngineConfig;
use crate::dtw::{DtwStep, IncrementalDtw};
use crate::types::{EnhancedSummary, RealtimeScore};

/// `volume`/`timing`/`pitch` sub-score smoothing constants (spec §4.9
/// leaves the exact shaping function to the implementation; these mirror
/// the `exp(-k * deviation)` family already used for `overall`).
const VOLUME_BETA: f64 = 0.15;
const TIMING_GAMMA: f64 = 2.0;
/// Saturating constant for the frame-count-weighted confidence score.
const CONFIDENCE_SATURATION_FRAMES: f64 = 50.0;
/// `overall` combines the four sub-scores with these weights (spec §9:
/// "a fixed constant chosen so..." — left unweighted by the spec for the
/// aggregate; an equal-ish split biased toward the MFCC term, which is
/// the only one the DTW path cost itself directly measures).
const WEIGHT_MFCC: f64 = 0.4;
const WEIGHT_VOLUME: f64 = 0.2;
const WEIGHT_TIMING: f64 = 0.2;
const WEIGHT_PITCH: f64 = 0.2;
/// `overall` at/above this threshold plus readiness implies `is_match`.
const MATCH_THRESHOLD: f64 = 0.6;

/// Reference data extracted from the master-call recording once, at
/// `createSession`/`loadMaster` time. Cheap to share across sessions that
/// load the same call (see `registry.rs`'s master cache).
pub struct MasterData {
    pub features: Vec<Vec<f32>>,
    pub mean_loudness_db: f64,
    pub pitch_trail: Vec<f32>,
    pub sample_rate: u32,
}

impl MasterData {
    pub fn build(config: &EngineConfig, audio: &MasterAudio) -> EngineResult<Self> {
        let pipeline_config = PipelineConfig {
            sample_rate: audio.sample_rate,
            frame_size: config.frame_size,
            hop_size: config.hop_size,
            mel_bands: config.mel_bands,
            mfcc_coeffs: config.mfcc_coeffs,
            min_frequency: config.min_frequency,
            max_frequency: config.max_frequency,
            vad: config.vad,
        };
        let mut pipeline = FramePipeline::new(pipeline_config);
        let pitch_window_size = config.pitch_window_size(audio.sample_rate);
        let mut pitch_tracker =
            PitchTracker::new(audio.sample_rate, pitch_window_size, config.pitch_median_window);

        let mut frame_stream = cf_dsp::FrameStream::new(config.frame_size, config.hop_size);
        let mut pitch_raw: VecDeque<f32> = VecDeque::with_capacity(pitch_window_size);

        let mut features = Vec::new();
        let mut pitch_trail = Vec::new();
        let mut loudness_sum = 0.0f64;
        let mut loudness_count = 0u64;

        for frame in frame_stream.submit(&audio.samples) {
            let window = fill_pitch_window(&mut pitch_raw, &frame, pitch_window_size);
            let pitch = pitch_tracker
                .process(&window)
                .map_err(|e| EngineError::ProcessingError(format!("master pitch tracking failed: {e}")))?;
            let analysis = pipeline.process(&frame, pitch.smoothed_hz, pitch.confidence);
            features.push(analysis.mfcc);
            pitch_trail.push(pitch.smoothed_hz);
            loudness_sum += cf_dsp::amplitude_to_db(analysis.level.integrated) as f64;
            loudness_count += 1;
        }

        if features.is_empty() {
            return Err(EngineError::InsufficientData(
                "master call produced zero analysis frames".to_string(),
            ));
        }

        let mean_loudness_db = if loudness_count > 0 {
            loudness_sum / loudness_count as f64
        } else {
            -f64::INFINITY
        };

        Ok(Self {
            features,
            mean_loudness_db,
            pitch_trail,
            sample_rate: audio.sample_rate,
        })
    }
}

fn fill_pitch_window(buffer: &mut VecDeque<f32>, frame: &[f32], window_size: usize) -> Vec<f32> {
    buffer.extend(frame.iter().copied());
    while buffer.len() > window_size {
        buffer.pop_front();
    }
    let mut window = vec![0.0f32; window_size];
    let start = window_size - buffer.len();
    for (i, v) in buffer.iter().enumerate() {
        window[start + i] = *v;
    }
    window
}

pub struct SessionState {
    pub id: SessionId,
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) sample_rate: u32,
    pub(crate) master: Arc<MasterData>,

    pipeline: FramePipeline,
    pitch_tracker: PitchTracker,
    pitch_window_size: usize,
    pitch_raw: VecDeque<f32>,
    frame_stream: cf_dsp::FrameStream,
    dtw: IncrementalDtw,

    pub(crate) user_features: Vec<Vec<f32>>,
    pub(crate) user_level_trail: Vec<LevelReading>,
    pub(crate) user_pitch_trail: Vec<PitchReading>,
    pub(crate) user_harmonic_trail: Vec<HarmonicReading>,
    pub(crate) user_vad_trail: Vec<VadDecision>,

    last_step: Option<DtwStep>,
    pub(crate) enhanced_enabled: bool,
    pub(crate) created_at: Instant,
    pub(crate) finalized: bool,
    pub(crate) finalized_summary: Option<EnhancedSummary>,
}

impl SessionState {
    pub fn new(
        id: SessionId,
        config: Arc<EngineConfig>,
        sample_rate: u32,
        master: Arc<MasterData>,
        enhanced_enabled: bool,
    ) -> Self {
        let pipeline_config = PipelineConfig {
            sample_rate,
            frame_size: config.frame_size,
            hop_size: config.hop_size,
            mel_bands: config.mel_bands,
            mfcc_coeffs: config.mfcc_coeffs,
            min_frequency: config.min_frequency,
            max_frequency: config.max_frequency,
            vad: config.vad,
        };
        let pitch_window_size = config.pitch_window_size(sample_rate);
        Self {
            id,
            pipeline: FramePipeline::new(pipeline_config),
            pitch_tracker: PitchTracker::new(sample_rate, pitch_window_size, config.pitch_median_window),
            pitch_window_size,
            pitch_raw: VecDeque::with_capacity(pitch_window_size),
            frame_stream: cf_dsp::FrameStream::new(config.frame_size, config.hop_size),
            dtw: IncrementalDtw::new(master.features.len(), true),
            user_features: Vec::new(),
            user_level_trail: Vec::new(),
            user_pitch_trail: Vec::new(),
            user_harmonic_trail: Vec::new(),
            user_vad_trail: Vec::new(),
            last_step: None,
            enhanced_enabled,
            created_at: Instant::now(),
            finalized: false,
            finalized_summary: None,
            sample_rate,
            master,
            config,
        }
    }

    pub fn process_chunk(&mut self, samples: &[f32]) -> EngineResult<()> {
        if self.finalized {
            // Calling `finalize` twice is `ALREADY_FINALIZED` (spec E6);
            // feeding more audio to an already-finalized session is a
            // processing error instead — the session is done accepting
            // input, which is a different failure than re-finalizing it.
            return Err(EngineError::ProcessingError(
                "session already finalized, no further audio accepted".to_string(),
            ));
        }
        if samples.is_empty() {
            return Err(EngineError::InvalidParams("chunk is empty".to_string()));
        }

        for frame in self.frame_stream.submit(samples) {
            let window = fill_pitch_window(&mut self.pitch_raw, &frame, self.pitch_window_size);
            let pitch: PitchReading = self
                .pitch_tracker
                .process(&window)
                .map_err(|e| EngineError::ProcessingError(format!("pitch tracking failed: {e}")))?;

            let analysis: FrameAnalysis = self.pipeline.process(&frame, pitch.smoothed_hz, pitch.confidence);
            let step = self.dtw.step(&self.master.features, &analysis.mfcc);

            self.user_features.push(analysis.mfcc);
            self.user_level_trail.push(analysis.level);
            self.user_pitch_trail.push(pitch);
            self.user_harmonic_trail.push(analysis.harmonic);
            self.user_vad_trail.push(analysis.vad);
            self.last_step = Some(step);
        }

        Ok(())
    }

    pub fn samples_analyzed(&self) -> u64 {
        (self.user_features.len() as u64) * self.config.hop_size as u64
    }

    fn is_ready(&self) -> bool {
        self.user_features.len() >= self.config.min_frames_for_readiness
            && self.pipeline.has_ever_been_voiced()
            && self.dtw.cost_has_stabilized()
    }

    fn volume_subscore(&self) -> f64 {
        let recent = self.user_level_trail.last();
        match recent {
            Some(reading) => {
                let user_db = cf_dsp::amplitude_to_db(reading.integrated) as f64;
                let delta = (user_db - self.master.mean_loudness_db).abs();
                (-VOLUME_BETA * delta).exp().clamp(0.0, 1.0)
            }
            None => 0.0,
        }
    }

    fn timing_subscore(&self, step: &DtwStep) -> f64 {
        let j = self.dtw.frames_processed().max(1) as f64;
        let slope = (step.best_row as f64 + 1.0) / j;
        (-TIMING_GAMMA * (slope - 1.0).abs()).exp().clamp(0.0, 1.0)
    }

    pub(crate) fn pitch_subscore(&self) -> f64 {
        self.pitch_subscore_over(0..self.user_pitch_trail.len())
    }

    /// Same cross-correlation as `pitch_subscore`, but restricted to the
    /// user frames in `range` (spec §4.10 step 4: aggregate per-frame
    /// signals over the selected match window, not the whole recording).
    pub(crate) fn pitch_subscore_over(&self, range: std::ops::Range<usize>) -> f64 {
        let end = range.end.min(self.user_pitch_trail.len());
        let start = range.start.min(end);
        let user: Vec<f64> = self.user_pitch_trail[start..end]
            .iter()
            .map(|r| r.smoothed_hz as f64)
            .collect();
        let n = user.len().min(self.master.pitch_trail.len());
        if n < 2 {
            return 0.0;
        }
        let master: Vec<f64> = self.master.pitch_trail[..n].iter().map(|v| *v as f64).collect();
        let user = &user[..n];

        let mean_m: f64 = master.iter().sum::<f64>() / n as f64;
        let mean_u: f64 = user.iter().sum::<f64>() / n as f64;
        let mut cov = 0.0;
        let mut var_m = 0.0;
        let mut var_u = 0.0;
        for i in 0..n {
            let dm = master[i] - mean_m;
            let du = user[i] - mean_u;
            cov += dm * du;
            var_m += dm * dm;
            var_u += du * du;
        }
        if var_m <= 0.0 || var_u <= 0.0 {
            return 0.5;
        }
        let corr = cov / (var_m.sqrt() * var_u.sqrt());
        ((corr + 1.0) / 2.0).clamp(0.0, 1.0)
    }

    fn confidence(&self) -> f64 {
        let u = self.user_features.len() as f64;
        (u / (u + CONFIDENCE_SATURATION_FRAMES)).clamp(0.0, 1.0)
    }

    /// Current running score (spec §4.9/§6). Returns `RealtimeScore::not_ready`
    /// before any frame has been processed.
    pub fn realtime_score(&self) -> RealtimeScore {
        let Some(step) = self.last_step else {
            return RealtimeScore::not_ready(0);
        };

        let mfcc = step.overall;
        let volume = self.volume_subscore();
        let timing = self.timing_subscore(&step);
        let pitch = self.pitch_subscore();
        let overall = WEIGHT_MFCC * mfcc + WEIGHT_VOLUME * volume + WEIGHT_TIMING * timing + WEIGHT_PITCH * pitch;
        let confidence = self.confidence();
        let is_reliable = self.is_ready();
        let is_match = is_reliable && overall >= MATCH_THRESHOLD;

        RealtimeScore {
            overall,
            mfcc,
            volume,
            timing,
            pitch,
            confidence,
            is_reliable,
            is_match,
            samples_analyzed: self.samples_analyzed(),
        }
    }

    pub fn harmonic_running_means(&self) -> HarmonicReading {
        self.harmonic_means_over(0..self.user_harmonic_trail.len())
    }

    /// Mean of each harmonic field over `range` of the user trail, rather
    /// than the pipeline's whole-session running mean (spec §4.10 step 4).
    pub fn harmonic_means_over(&self, range: std::ops::Range<usize>) -> HarmonicReading {
        let end = range.end.min(self.user_harmonic_trail.len());
        let start = range.start.min(end);
        let window = &self.user_harmonic_trail[start..end];
        if window.is_empty() {
            return HarmonicReading {
                spectral_centroid_hz: 0.0,
                spectral_rolloff_hz: 0.0,
                spectral_flatness: 0.0,
                harmonic_ratio: 0.0,
            };
        }
        let n = window.len() as f64;
        let mut centroid = 0.0f64;
        let mut rolloff = 0.0f64;
        let mut flatness = 0.0f64;
        let mut harmonic_ratio = 0.0f64;
        for r in window {
            centroid += r.spectral_centroid_hz as f64;
            rolloff += r.spectral_rolloff_hz as f64;
            flatness += r.spectral_flatness as f64;
            harmonic_ratio += r.harmonic_ratio as f64;
        }
        HarmonicReading {
            spectral_centroid_hz: (centroid / n) as f32,
            spectral_rolloff_hz: (rolloff / n) as f32,
            spectral_flatness: (flatness / n) as f32,
            harmonic_ratio: (harmonic_ratio / n) as f32,
        }
    }

    pub fn estimate_tempo(&self) -> (f32, f32) {
        self.estimate_tempo_over(0..self.pipeline.onset_envelope().len())
    }

    /// Autocorrelate only the onset-envelope slice in `range` (spec §4.10
    /// step 4) instead of the whole session's onset history.
    pub fn estimate_tempo_over(&self, range: std::ops::Range<usize>) -> (f32, f32) {
        let envelope = self.pipeline.onset_envelope();
        let end = range.end.min(envelope.len());
        let start = range.start.min(end);
        let fps = self.sample_rate as f32 / self.config.hop_size as f32;
        cf_dsp::estimate_tempo_over(&envelope[start..end], fps)
    }

    pub fn median_pitch_hz(&self) -> f64 {
        self.median_pitch_hz_over(0..self.user_pitch_trail.len())
    }

    /// Median of the voiced pitch readings in `range` (spec §4.10 step 4).
    pub fn median_pitch_hz_over(&self, range: std::ops::Range<usize>) -> f64 {
        let end = range.end.min(self.user_pitch_trail.len());
        let start = range.start.min(end);
        let mut values: Vec<f32> = self.user_pitch_trail[start..end]
            .iter()
            .map(|r| r.smoothed_hz)
            .filter(|v| *v > 0.0)
            .collect();
        if values.is_empty() {
            return 0.0;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        values[values.len() / 2] as f64
    }

    pub fn mean_pitch_confidence(&self) -> f64 {
        if self.user_pitch_trail.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.user_pitch_trail.iter().map(|r| r.confidence as f64).sum();
        sum / self.user_pitch_trail.len() as f64
    }

    pub fn readiness_gate(&self) -> EngineResult<()> {
        if self.user_features.is_empty() {
            return Err(EngineError::InsufficientData(
                "no audio processed yet".to_string(),
            ));
        }
        Ok(())
    }
}

/// Grades are applied by the Finalizer to normalized `[0,1]` scores
/// (spec §4.10); exposed here so both `finalizer.rs` and tests share one
/// mapping entry point.
pub fn grade(score: f64) -> Grade {
    Grade::from_score(score)
}
