//! cf-engine: session registry, incremental DTW scorer, and finalizer for
//! the Unified Audio Analysis Engine — the crate callers depend on.

mod api;
mod config;
mod dtw;
mod finalizer;
mod registry;
mod session;
mod types;

pub use api::Engine;
pub use config::EngineConfig;
pub use session::MasterData;
pub use types::{
    CadenceSummary, EnhancedSummary, FinalizeSummary, HarmonicSummary, PitchSummary, RealtimeScore,
};

pub use cf_core::{EngineError, EngineResult, Grade, SessionId};
