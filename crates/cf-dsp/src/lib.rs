//! cf-dsp: streaming DSP building blocks for the Unified Audio Analysis
//! Engine — framing, windowing, FFT, MFCC extraction, level detection,
//! voice-activity detection, harmonic analysis, and cadence analysis.

pub mod cadence;
pub mod fft;
pub mod frame_stream;
pub mod harmonic;
pub mod level;
pub mod mel;
pub mod pipeline;
pub mod vad;
pub mod window;

pub use cadence::{estimate_tempo_over, CadenceAnalyzer};
pub use fft::RealFft;
pub use frame_stream::{Frame, FrameStream};
pub use harmonic::{HarmonicAnalyzer, HarmonicReading};
pub use level::{amplitude_to_db, LevelDetector, LevelReading};
pub use mel::{Dct, MelFilterbank, MfccExtractor};
pub use pipeline::{FrameAnalysis, FramePipeline, PipelineConfig};
pub use vad::{zero_crossing_rate, VadConfig, VadDecision, VoiceActivityDetector};
pub use window::HannWindow;
