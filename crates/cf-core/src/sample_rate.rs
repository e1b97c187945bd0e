//! Sample rate validation shared by session creation and master-call loading.

use crate::error::{EngineError, EngineResult};

pub const MIN_SAMPLE_RATE_HZ: u32 = 8_000;
pub const MAX_SAMPLE_RATE_HZ: u32 = 192_000;

/// Validate a requested sample rate against the engine's supported range
/// (spec §4.1: `createSession` fails with `INIT_FAILED` outside 8kHz–192kHz).
pub fn validate_sample_rate(sample_rate: u32) -> EngineResult<()> {
    if !(MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ).contains(&sample_rate) {
        return Err(EngineError::InitFailed(format!(
            "unsupported sample rate {sample_rate} Hz (must be {MIN_SAMPLE_RATE_HZ}-{MAX_SAMPLE_RATE_HZ})"
        )));
    }
    Ok(())
}
