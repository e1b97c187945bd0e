//! Error types for pitch tracking.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PitchError {
    #[error("input too short: {0} samples, need at least {1}")]
    InputTooShort(usize, usize),

    #[error("invalid frequency range: {min} - {max} Hz")]
    InvalidFrequencyRange { min: u32, max: u32 },
}

pub type PitchResult<T> = Result<T, PitchError>;
