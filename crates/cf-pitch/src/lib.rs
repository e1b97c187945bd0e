//! cf-pitch: YIN-based per-frame fundamental frequency tracking with
//! median smoothing for the Unified Audio Analysis Engine.

mod error;
mod smoothing;
mod tracker;
mod yin;

pub use error::{PitchError, PitchResult};
pub use smoothing::MedianPitchSmoother;
pub use tracker::{PitchReading, PitchTracker};
pub use yin::{YinConfig, YinDetector};
