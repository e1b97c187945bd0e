//! Result structures exposed across the public API boundary (spec §6).

use cf_core::Grade;
use serde::{Deserialize, Serialize};

/// Running similarity score, readable at any time via `getRealtimeFeedback`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealtimeScore {
    pub overall: f64,
    pub mfcc: f64,
    pub volume: f64,
    pub timing: f64,
    pub pitch: f64,
    pub confidence: f64,
    pub is_reliable: bool,
    pub is_match: bool,
    pub samples_analyzed: u64,
}

impl RealtimeScore {
    pub fn not_ready(samples_analyzed: u64) -> Self {
        Self {
            overall: 0.0,
            mfcc: 0.0,
            volume: 0.0,
            timing: 0.0,
            pitch: 0.0,
            confidence: 0.0,
            is_reliable: false,
            is_match: false,
            samples_analyzed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchSummary {
    pub pitch_hz: f64,
    pub confidence: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonicSummary {
    pub fundamental_hz: f64,
    pub confidence: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CadenceSummary {
    pub tempo_bpm: f64,
    pub confidence: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalizeSummary {
    pub similarity_at_finalize: f64,
    pub normalization_scalar: f64,
    pub loudness_deviation_db: f64,
    pub segment_start_ms: f64,
    pub segment_duration_ms: f64,
}

impl Default for FinalizeSummary {
    fn default() -> Self {
        Self {
            similarity_at_finalize: 0.0,
            normalization_scalar: 1.0,
            loudness_deviation_db: 0.0,
            segment_start_ms: 0.0,
            segment_duration_ms: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhancedSummary {
    pub pitch: PitchSummary,
    pub harmonic: HarmonicSummary,
    pub cadence: CadenceSummary,
    pub finalize: FinalizeSummary,
    pub valid: bool,
    pub finalized: bool,
}

impl Default for EnhancedSummary {
    fn default() -> Self {
        Self {
            pitch: PitchSummary {
                pitch_hz: 0.0,
                confidence: 0.0,
                grade: Grade::F,
            },
            harmonic: HarmonicSummary {
                fundamental_hz: 0.0,
                confidence: 0.0,
                grade: Grade::F,
            },
            cadence: CadenceSummary {
                tempo_bpm: 0.0,
                confidence: 0.0,
                grade: Grade::F,
            },
            finalize: FinalizeSummary::default(),
            valid: false,
            finalized: false,
        }
    }
}
