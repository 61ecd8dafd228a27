pub mod config;
pub mod plan;
pub mod results;
pub mod schedule;
pub mod session;
pub mod soa;

pub use config::ExperimentConfig;
pub use plan::{quantize_onset, TrialPlan};
pub use schedule::{balanced_targets, cue_for_trial};
pub use session::Session;
pub use soa::SoaPool;
