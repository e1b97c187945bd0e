//! Session registry: the two-tier locking scheme from spec §5 — a
//! registry-level `RwLock` guards the session table itself (short holds,
//! for create/destroy/list), while each session's audio processing runs
//! under its own `Mutex` so concurrent sessions never block each other.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use cf_core::{
    load_master_wav, resolve_master_path, validate_sample_rate, EngineError, EngineResult, SessionId,
    SessionIdAllocator,
};
use parking_lot::{Mutex, RwLock};

use crate::config::EngineConfig;
use crate::session::{MasterData, SessionState};

/// A session exists in the registry from `createSession` onward, but only
/// gains its DSP pipeline and DTW state once `loadMaster` succeeds (spec
/// §4.11: `createSession` and `loadMaster` are separate operations).
enum Slot {
    AwaitingMaster { sample_rate: u32 },
    Ready(SessionState),
}

pub struct SessionRegistry {
    config: Arc<EngineConfig>,
    allocator: SessionIdAllocator,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Slot>>>>,
    master_cache: RwLock<HashMap<PathBuf, Arc<MasterData>>>,
}

impl SessionRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            allocator: SessionIdAllocator::new(),
            sessions: RwLock::new(HashMap::new()),
            master_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    pub fn create_session(&self, sample_rate: u32) -> EngineResult<SessionId> {
        validate_sample_rate(sample_rate)?;
        let id = self.allocator.allocate();
        self.sessions
            .write()
            .insert(id, Arc::new(Mutex::new(Slot::AwaitingMaster { sample_rate })));
        log::info!("session {id} created at {sample_rate} Hz");
        Ok(id)
    }

    fn resolve_and_load_master(&self, master_call_path: &str) -> EngineResult<Arc<MasterData>> {
        let resolved = resolve_master_path(&self.config.master_calls_path, master_call_path);
        if let Some(existing) = self.master_cache.read().get(&resolved) {
            return Ok(existing.clone());
        }
        let audio = load_master_wav(&resolved)?;
        let data = Arc::new(MasterData::build(&self.config, &audio)?);
        self.master_cache.write().insert(resolved, data.clone());
        Ok(data)
    }

    pub fn load_master(
        &self,
        id: SessionId,
        master_call_path: &str,
        enhanced_analysis: Option<bool>,
    ) -> EngineResult<()> {
        let slot_handle = self.slot_handle(id)?;
        // Read the slot's sample rate under a short-lived lock, released
        // before the (potentially blocking) WAV I/O below, so a slow
        // master load never blocks other calls on this session.
        let sample_rate = {
            let slot = slot_handle.lock();
            match &*slot {
                Slot::AwaitingMaster { sample_rate } => *sample_rate,
                Slot::Ready(_) => {
                    return Err(EngineError::InvalidParams(
                        "master already loaded for this session".to_string(),
                    ))
                }
            }
        };

        let master = self.resolve_and_load_master(master_call_path)?;
        let enhanced_enabled = enhanced_analysis.unwrap_or(self.config.enhanced_analysis_default);

        // Re-acquire the lock only to install the now-loaded master; a
        // concurrent call could have raced us into `Ready` in between, so
        // this is re-checked rather than assumed.
        let mut slot = slot_handle.lock();
        match &*slot {
            Slot::AwaitingMaster { .. } => {
                *slot = Slot::Ready(SessionState::new(
                    id,
                    self.config.clone(),
                    sample_rate,
                    master,
                    enhanced_enabled,
                ));
                log::info!("session {id} loaded master call {master_call_path}");
                Ok(())
            }
            Slot::Ready(_) => Err(EngineError::InvalidParams(
                "master already loaded for this session".to_string(),
            )),
        }
    }

    fn slot_handle(&self, id: SessionId) -> EngineResult<Arc<Mutex<Slot>>> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or(EngineError::SessionNotFound)
    }

    pub fn with_session<T>(&self, id: SessionId, f: impl FnOnce(&mut SessionState) -> EngineResult<T>) -> EngineResult<T> {
        let slot_handle = self.slot_handle(id)?;
        let mut slot = slot_handle.lock();
        match &mut *slot {
            Slot::Ready(session) => f(session),
            Slot::AwaitingMaster { .. } => Err(EngineError::InvalidParams(
                "no master call loaded for this session yet".to_string(),
            )),
        }
    }

    pub fn with_session_ref<T>(&self, id: SessionId, f: impl FnOnce(&SessionState) -> EngineResult<T>) -> EngineResult<T> {
        let slot_handle = self.slot_handle(id)?;
        let slot = slot_handle.lock();
        match &*slot {
            Slot::Ready(session) => f(session),
            Slot::AwaitingMaster { .. } => Err(EngineError::InvalidParams(
                "no master call loaded for this session yet".to_string(),
            )),
        }
    }

    pub fn destroy_session(&self, id: SessionId) -> EngineResult<()> {
        let removed = self.sessions.write().remove(&id);
        if removed.is_some() {
            log::info!("session {id} destroyed");
            Ok(())
        } else {
            Err(EngineError::SessionNotFound)
        }
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        self.sessions.read().keys().copied().collect()
    }

    #[cfg(test)]
    pub(crate) fn master_cache_len(&self) -> usize {
        self.master_cache.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EngineConfig {
        EngineConfig {
            master_calls_path: std::env::temp_dir(),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn unknown_session_is_not_found() {
        let registry = SessionRegistry::new(test_config());
        let result = registry.with_session_ref(SessionId(999), |_| Ok(()));
        assert_eq!(result, Err(EngineError::SessionNotFound));
    }

    #[test]
    fn processing_before_load_master_is_invalid() {
        let registry = SessionRegistry::new(test_config());
        let id = registry.create_session(44_100).unwrap();
        let result = registry.with_session(id, |s| s.process_chunk(&[0.0; 64]));
        assert!(matches!(result, Err(EngineError::InvalidParams(_))));
    }

    #[test]
    fn destroy_then_lookup_is_not_found() {
        let registry = SessionRegistry::new(test_config());
        let id = registry.create_session(44_100).unwrap();
        registry.destroy_session(id).unwrap();
        assert_eq!(registry.destroy_session(id), Err(EngineError::SessionNotFound));
    }

    #[test]
    fn rejects_out_of_range_sample_rate() {
        let registry = SessionRegistry::new(test_config());
        assert!(registry.create_session(1).is_err());
    }

    #[test]
    fn two_sessions_sharing_a_master_path_cache_it_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..44_100 {
            let t = i as f32 / 44_100.0;
            let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let registry = SessionRegistry::new(test_config());
        let id_a = registry.create_session(44_100).unwrap();
        let id_b = registry.create_session(44_100).unwrap();
        registry
            .load_master(id_a, &path.to_string_lossy(), Some(true))
            .unwrap();
        registry
            .load_master(id_b, &path.to_string_lossy(), Some(true))
            .unwrap();
        assert_eq!(registry.master_cache_len(), 1);
    }
}
