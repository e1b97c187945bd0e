//! Finalizer (spec §4.10): sweeps candidate segment offsets, recomputes
//! an unbanded DTW over the best one, and grades the pitch/harmonic/
//! cadence dimensions from the per-frame trails accumulated during
//! streaming.

use rayon::prelude::*;

use cf_core::{EngineError, EngineResult};

use crate::dtw::full_dtw;
use crate::session::{grade, SessionState};
use crate::types::{CadenceSummary, EnhancedSummary, FinalizeSummary, HarmonicSummary, PitchSummary};

/// Candidate segment-start offsets are swept at this stride (in user
/// frames) over the whole buffered recording (spec §4.10 "segment
/// selection sweep").
const SWEEP_STRIDE_FRAMES: usize = 4;

/// A user recording shorter than the master's length by more than this
/// fraction cannot contain a full rendition of the call (spec §4.10 step
/// 1: "the user stream is shorter than the master's lower tolerance").
const SEGMENT_LENGTH_TOLERANCE: f64 = 0.20;

struct SegmentCandidate {
    start: usize,
    total_cost: f64,
    path_length: usize,
}

/// Slide a window the length of the master recording across the user's
/// buffered frames, scoring every `SWEEP_STRIDE_FRAMES`'th start offset
/// with a full (unbanded) DTW in parallel, and keep the cheapest per path
/// length.
fn select_best_segment(master: &[Vec<f32>], user: &[Vec<f32>]) -> EngineResult<SegmentCandidate> {
    let m = master.len();
    if user.len() < m {
        // Shorter recordings are still scored end-to-end; the whole
        // buffer is the only candidate segment.
        let result = full_dtw(master, user, true);
        return Ok(SegmentCandidate {
            start: 0,
            total_cost: result.total_cost,
            path_length: result.path_length.max(1),
        });
    }

    let max_start = user.len() - m;
    let mut starts = Vec::new();
    let mut start = 0usize;
    loop {
        starts.push(start);
        if start >= max_start {
            break;
        }
        start = (start + SWEEP_STRIDE_FRAMES).min(max_start);
    }

    starts
        .into_par_iter()
        .map(|start| {
            let window = &user[start..start + m];
            let result = full_dtw(master, window, true);
            SegmentCandidate {
                start,
                total_cost: result.total_cost,
                path_length: result.path_length,
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .min_by(|a, b| {
            let norm_a = a.total_cost / (a.path_length.max(1) as f64).sqrt();
            let norm_b = b.total_cost / (b.path_length.max(1) as f64).sqrt();
            norm_a.partial_cmp(&norm_b).unwrap()
        })
        .ok_or_else(|| EngineError::ProcessingError("segment sweep produced no candidate".to_string()))
}

/// Run the Finalizer over a session's accumulated audio and lock in its
/// `EnhancedSummary`. Returns an error without mutating `finalized` if
/// there isn't enough data (spec: `INSUFFICIENT_DATA`).
pub fn finalize(session: &mut SessionState) -> EngineResult<EnhancedSummary> {
    if session.finalized {
        return Err(EngineError::AlreadyFinalized);
    }
    session.readiness_gate()?;
    let master_len = session.master.features.len();
    let user_len = session.user_features.len();
    if user_len < session.config.min_frames_for_readiness {
        return Err(EngineError::InsufficientData(format!(
            "need at least {} analyzed frames, have {}",
            session.config.min_frames_for_readiness, user_len
        )));
    }
    // Below the master's lower length tolerance there's no contiguous
    // window long enough to contain a full rendition of the call; this
    // is a valid (if unmatched) outcome, not a processing error.
    let lower_tolerance = (master_len as f64 * (1.0 - SEGMENT_LENGTH_TOLERANCE)).floor() as usize;
    if user_len < lower_tolerance {
        log::info!(
            "finalize: session {} too short to align ({user_len} frames vs {lower_tolerance} needed)",
            session.id
        );
        let summary = EnhancedSummary {
            valid: false,
            finalized: true,
            ..EnhancedSummary::default()
        };
        session.finalized = true;
        session.finalized_summary = Some(summary);
        return Ok(summary);
    }

    let candidate = select_best_segment(&session.master.features, &session.user_features)?;

    let norm_cost = candidate.total_cost / (candidate.path_length.max(1) as f64).sqrt();
    let similarity_at_finalize = (-crate::dtw::ALPHA * norm_cost).exp().clamp(0.0, 1.0);

    let hop_ms = 1000.0 * session.config.hop_size as f64 / session.sample_rate as f64;
    let segment_start_ms = candidate.start as f64 * hop_ms;
    let segment_duration_ms = session.master.features.len() as f64 * hop_ms;

    let segment_end = (candidate.start + session.master.features.len()).min(session.user_features.len());
    let window_level = &session.user_level_trail[candidate.start.min(session.user_level_trail.len())..segment_end.min(session.user_level_trail.len())];
    let user_loudness_db = if window_level.is_empty() {
        -f64::INFINITY
    } else {
        let sum: f64 = window_level
            .iter()
            .map(|r| cf_dsp::amplitude_to_db(r.integrated) as f64)
            .sum();
        sum / window_level.len() as f64
    };
    let loudness_deviation_db = user_loudness_db - session.master.mean_loudness_db;

    // Normalization scalar: the gain that would bring the user's mean
    // loudness (in linear amplitude) in line with the master's (spec
    // §4.10 "normalizationScalar" — used by callers that want to
    // re-level a recording before further processing).
    let normalization_scalar = if loudness_deviation_db.is_finite() {
        10f64.powf(-loudness_deviation_db / 20.0)
    } else {
        1.0
    };

    let finalize_summary = FinalizeSummary {
        similarity_at_finalize,
        normalization_scalar,
        loudness_deviation_db,
        segment_start_ms,
        segment_duration_ms,
    };

    let window = candidate.start..segment_end;

    let pitch_score = session.pitch_subscore_over(window.clone());
    let median_pitch = session.median_pitch_hz_over(window.clone());
    let pitch_summary = PitchSummary {
        pitch_hz: median_pitch,
        confidence: pitch_score,
        grade: grade(pitch_score),
    };

    let harmonic_means = session.harmonic_means_over(window.clone());
    let harmonic_score = harmonic_means.harmonic_ratio as f64;
    let harmonic_summary = HarmonicSummary {
        fundamental_hz: median_pitch,
        confidence: harmonic_score,
        grade: grade(harmonic_score),
    };

    let (tempo_bpm, rhythm_strength) = session.estimate_tempo_over(window);
    let cadence_summary = CadenceSummary {
        tempo_bpm: tempo_bpm as f64,
        confidence: rhythm_strength as f64,
        grade: grade(rhythm_strength as f64),
    };

    let summary = EnhancedSummary {
        pitch: pitch_summary,
        harmonic: harmonic_summary,
        cadence: cadence_summary,
        finalize: finalize_summary,
        valid: true,
        finalized: true,
    };

    session.finalized = true;
    session.finalized_summary = Some(summary);
    log::info!(
        "finalize: session {} similarity={:.3} grades pitch={:?} harmonic={:?} cadence={:?}",
        session.id,
        similarity_at_finalize,
        pitch_summary.grade,
        harmonic_summary.grade,
        cadence_summary.grade
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtw::mfcc_distance;

    fn row(v: f32) -> Vec<f32> {
        vec![v; 13]
    }

    #[test]
    fn identical_short_segments_select_offset_zero() {
        let master: Vec<Vec<f32>> = (0..10).map(|i| row(i as f32)).collect();
        let user: Vec<Vec<f32>> = master.clone();
        let candidate = select_best_segment(&master, &user).unwrap();
        assert_eq!(candidate.start, 0);
        assert!(candidate.total_cost.abs() < 1e-6);
    }

    #[test]
    fn finds_offset_in_padded_recording() {
        let master: Vec<Vec<f32>> = (0..10).map(|i| row(i as f32)).collect();
        let mut user: Vec<Vec<f32>> = vec![row(-100.0); 8];
        user.extend(master.iter().cloned());
        user.extend(vec![row(-100.0); 8]);
        let candidate = select_best_segment(&master, &user).unwrap();
        // The sweep stride is coarse; the detected offset should be
        // within one stride of the true padding length.
        assert!((candidate.start as i64 - 8).unsigned_abs() <= SWEEP_STRIDE_FRAMES as u64);
    }

    #[test]
    fn mfcc_distance_matches_manual_euclidean() {
        let a = row(1.0);
        let b = row(4.0);
        let d = mfcc_distance(&a, &b, false);
        let expected = (13.0f64 * 9.0).sqrt();
        assert!((d - expected).abs() < 1e-6);
    }
}
