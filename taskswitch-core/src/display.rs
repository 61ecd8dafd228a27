use crate::cue::{CueType, TargetLocation};

/// What to draw in place of the central fixation annulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixationView {
    /// White annulus.
    Normal,
    /// Red annulus, shown after an incorrect response.
    Error,
    /// Reaction time in ms, shown after a correct response.
    ReactionTime(u32),
}

/// Immediate-mode description of a trial display: cue border, flanker
/// markers, fixation/feedback and (optionally) the filled target marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialView {
    pub cue: CueType,
    pub target: Option<TargetLocation>,
    pub fixation: FixationView,
}

/// The renderer draws exactly what this says; the session derives it from
/// its phase and trial state each frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    Blank,
    Message(&'static str),
    Trial(TrialView),
}
