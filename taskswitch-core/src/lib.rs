pub mod cue;
pub mod display;
pub mod phase;
pub mod trial;

pub use cue::{CueType, SignalType, TargetLocation};
pub use display::{DisplayState, FixationView, TrialView};
pub use phase::SessionPhase;
pub use trial::{Response, TrialEvent, TrialRecord, TrialState};
