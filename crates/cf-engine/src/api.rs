//! Public, in-process API surface (spec §4.11): a thread-safe `Engine`
//! handle that can be cloned and shared across threads — every method
//! takes `&self`.

use std::sync::Arc;

use cf_core::{EngineResult, SessionId};

use crate::config::EngineConfig;
use crate::finalizer;
use crate::registry::SessionRegistry;
use crate::types::{EnhancedSummary, RealtimeScore};

/// Entry point for the Unified Audio Analysis Engine. Cheap to clone —
/// internally an `Arc<SessionRegistry>` — so callers can hand copies to
/// worker threads without wrapping it themselves.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<SessionRegistry>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(config)),
        }
    }

    /// Allocate a session for a given input sample rate. The session
    /// cannot accept audio until `load_master` attaches a reference call.
    pub fn create_session(&self, sample_rate: u32) -> EngineResult<SessionId> {
        self.registry.create_session(sample_rate)
    }

    /// Load the master-call recording a session will be scored against.
    /// `master_call_path` may be a bare call id resolved against the
    /// engine's configured `master_calls_path`, or a direct path (spec §6).
    pub fn load_master(
        &self,
        session_id: SessionId,
        master_call_path: &str,
        enhanced_analysis: Option<bool>,
    ) -> EngineResult<()> {
        self.registry
            .load_master(session_id, master_call_path, enhanced_analysis)
    }

    /// Feed the next chunk of raw float samples for a session.
    pub fn process_chunk(&self, session_id: SessionId, samples: &[f32]) -> EngineResult<()> {
        self.registry
            .with_session(session_id, |session| session.process_chunk(samples))
    }

    /// Read the current running similarity score without finalizing.
    pub fn get_realtime_feedback(&self, session_id: SessionId) -> EngineResult<RealtimeScore> {
        self.registry
            .with_session_ref(session_id, |session| Ok(session.realtime_score()))
    }

    /// Read the current enhanced summary. Before `finalize_session_analysis`
    /// has run, this reflects the in-progress pitch/harmonic/cadence
    /// trails with `finalized: false` and an empty `FinalizeSummary`.
    pub fn get_enhanced_analysis_summary(&self, session_id: SessionId) -> EngineResult<EnhancedSummary> {
        self.registry.with_session_ref(session_id, |session| {
            if let Some(summary) = session.finalized_summary {
                return Ok(summary);
            }
            if !session.enhanced_enabled {
                return Ok(EnhancedSummary {
                    valid: false,
                    ..EnhancedSummary::default()
                });
            }
            Ok(EnhancedSummary {
                pitch: crate::types::PitchSummary {
                    pitch_hz: session.median_pitch_hz(),
                    confidence: session.pitch_subscore(),
                    grade: crate::session::grade(session.pitch_subscore()),
                },
                harmonic: crate::types::HarmonicSummary {
                    fundamental_hz: session.median_pitch_hz(),
                    confidence: session.harmonic_running_means().harmonic_ratio as f64,
                    grade: crate::session::grade(session.harmonic_running_means().harmonic_ratio as f64),
                },
                cadence: {
                    let (tempo, strength) = session.estimate_tempo();
                    crate::types::CadenceSummary {
                        tempo_bpm: tempo as f64,
                        confidence: strength as f64,
                        grade: crate::session::grade(strength as f64),
                    }
                },
                finalize: crate::types::FinalizeSummary::default(),
                valid: true,
                finalized: session.finalized,
            })
        })
    }

    /// Finalize a session: select the best-matching segment, rerun an
    /// unbanded DTW over it, and lock in letter grades. Idempotent only
    /// in the sense that a second call returns `ALREADY_FINALIZED`
    /// rather than recomputing (spec §4.10).
    pub fn finalize_session_analysis(&self, session_id: SessionId) -> EngineResult<EnhancedSummary> {
        self.registry
            .with_session(session_id, |session| finalizer::finalize(session))
    }

    pub fn destroy_session(&self, session_id: SessionId) -> EngineResult<()> {
        self.registry.destroy_session(session_id)
    }

    pub fn get_active_sessions(&self) -> Vec<SessionId> {
        self.registry.active_sessions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sine_wav(path: &std::path::Path, freq: f32, seconds: f32, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let n = (seconds * sample_rate as f32) as usize;
        for i in 0..n {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn engine_with_master(freq: f32) -> (Engine, tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call.wav");
        write_sine_wav(&path, freq, 1.0, 44_100);
        let mut config = EngineConfig::default();
        config.master_calls_path = dir.path().to_path_buf();
        (Engine::new(config), dir, path.to_string_lossy().to_string())
    }

    #[test]
    fn session_not_found_before_creation() {
        let (engine, _dir, _path) = engine_with_master(440.0);
        let result = engine.get_realtime_feedback(SessionId(42));
        assert_eq!(result, Err(cf_core::EngineError::SessionNotFound));
    }

    #[test]
    fn full_lifecycle_returns_plausible_scores() {
        let (engine, _dir, master_path) = engine_with_master(440.0);
        let id = engine.create_session(44_100).unwrap();
        engine.load_master(id, &master_path, Some(true)).unwrap();

        let sine: Vec<f32> = (0..44_100)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44_100.0).sin() * 0.5)
            .collect();
        for chunk in sine.chunks(4096) {
            engine.process_chunk(id, chunk).unwrap();
        }

        let feedback = engine.get_realtime_feedback(id).unwrap();
        assert!(feedback.overall > 0.5);

        let summary = engine.finalize_session_analysis(id).unwrap();
        assert!(summary.finalized);
        assert!(summary.finalize.similarity_at_finalize > 0.5);

        let second = engine.finalize_session_analysis(id);
        assert_eq!(second, Err(cf_core::EngineError::AlreadyFinalized));

        engine.destroy_session(id).unwrap();
        assert!(engine.get_active_sessions().is_empty());
    }

    #[test]
    fn process_chunk_before_load_master_is_rejected() {
        let (engine, _dir, _path) = engine_with_master(440.0);
        let id = engine.create_session(44_100).unwrap();
        let result = engine.process_chunk(id, &[0.0; 64]);
        assert!(matches!(result, Err(cf_core::EngineError::InvalidParams(_))));
    }
}
