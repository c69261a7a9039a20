//! PA Flux - Physical activity reduction for raw accelerometer recordings
//!
//! Flux turns a triaxial acceleration stream and its activity counts into
//! minute-level wear and intensity tables through a deterministic pipeline:
//! sample ingestion → non-wear detection (Choi, van Hees) → ENMO → multi-rate
//! resampling → daily aggregation.
//!
//! ## Modules
//!
//! - **Signal reduction**: wear flags and ENMO on a shared 60 s / 10 s timeline
//! - **Daily aggregation**: wear time and minutes per intensity band per day

pub mod adapters;
pub mod config;
pub mod daily;
pub mod encoder;
pub mod error;
pub mod magnitude;
pub mod nonwear;
pub mod pipeline;
pub mod reducer;
pub mod resample;
pub mod types;

pub use config::{ChoiConfig, Cutpoints, DailyConfig, PipelineConfig, VanHeesConfig, WakingHours};
pub use daily::DailyAggregator;
pub use encoder::ReportEncoder;
pub use error::ComputeError;
pub use pipeline::{process_recording, ActivityProcessor, ProcessedRecording};
pub use reducer::{ReducedRecording, SignalReducer};

/// Flux version embedded in every report
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "pa-flux";
