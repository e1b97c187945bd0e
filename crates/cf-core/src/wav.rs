//! Master-call WAV loading.
//!
//! Canonical PCM WAV only (spec §6): RIFF/WAVE, PCM tag, mono preferred
//! (multichannel mixed to mono by averaging), 16/24/32-bit, 8kHz-192kHz.

use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::sample_rate::validate_sample_rate;

/// A loaded, mono, float-normalized master-call recording.
#[derive(Debug, Clone)]
pub struct MasterAudio {
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

/// Resolve `path` against `master_calls_path` when it is a bare call id
/// (no path separators, no extension), else use it directly (spec §6).
pub fn resolve_master_path(master_calls_path: &Path, path: &str) -> PathBuf {
    let looks_bare = !path.contains('/') && !path.contains('\\') && !path.contains('.');
    if looks_bare {
        master_calls_path.join(format!("{path}.wav"))
    } else {
        PathBuf::from(path)
    }
}

/// Load and decode a master-call WAV file, mixing down to mono and
/// normalizing integer PCM to `[-1.0, 1.0]` floats.
pub fn load_master_wav(path: &Path) -> EngineResult<MasterAudio> {
    let mut reader = hound::WavReader::open(path).map_err(|e| {
        log::warn!("cannot open master call {}: {e}", path.display());
        EngineError::ProcessingError(format!("cannot open master call {}: {e}", path.display()))
    })?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int && spec.sample_format != hound::SampleFormat::Float {
        return Err(EngineError::ProcessingError(
            "master call is not PCM".to_string(),
        ));
    }
    if ![16u16, 24, 32].contains(&spec.bits_per_sample) {
        return Err(EngineError::ProcessingError(format!(
            "unsupported bit depth {} (need 16/24/32)",
            spec.bits_per_sample
        )));
    }
    validate_sample_rate(spec.sample_rate)?;

    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(EngineError::ProcessingError("master call has zero channels".into()));
    }

    let mono = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            let interleaved: Vec<f32> = reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()
                .map_err(|e| EngineError::ProcessingError(format!("decode error: {e}")))?;
            downmix(&interleaved, channels)
        }
        hound::SampleFormat::Float => {
            let interleaved: Vec<f32> = reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| EngineError::ProcessingError(format!("decode error: {e}")))?;
            downmix(&interleaved, channels)
        }
    };

    if mono.is_empty() {
        return Err(EngineError::ProcessingError("master call has no audio frames".into()));
    }

    log::info!(
        "loaded master call {} ({} Hz, {} frames)",
        path.display(),
        spec.sample_rate,
        mono.len()
    );

    Ok(MasterAudio {
        sample_rate: spec.sample_rate,
        samples: mono,
    })
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn loads_mono_pcm16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call.wav");
        write_test_wav(&path, 44100, 1, &[0, 16384, -16384, 32767]);
        let m = load_master_wav(&path).unwrap();
        assert_eq!(m.sample_rate, 44100);
        assert_eq!(m.samples.len(), 4);
        assert!((m.samples[1] - 0.5).abs() < 0.01);
    }

    #[test]
    fn downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call.wav");
        // L=1.0 scaled, R=0.0 scaled -> mono ~ 0.5 scaled
        write_test_wav(&path, 8000, 2, &[32767, 0, 32767, 0]);
        let m = load_master_wav(&path).unwrap();
        assert_eq!(m.samples.len(), 2);
        assert!((m.samples[0] - 0.5).abs() < 0.01);
    }

    #[test]
    fn rejects_bad_sample_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call.wav");
        write_test_wav(&path, 4000, 1, &[0, 1, 2]);
        assert!(load_master_wav(&path).is_err());
    }

    #[test]
    fn resolves_bare_id() {
        let root = Path::new("/calls");
        assert_eq!(resolve_master_path(root, "coyote_howl"), PathBuf::from("/calls/coyote_howl.wav"));
        assert_eq!(resolve_master_path(root, "/abs/path.wav"), PathBuf::from("/abs/path.wav"));
    }
}
