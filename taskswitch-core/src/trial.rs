use serde::{Deserialize, Serialize};

use crate::cue::{CueType, TargetLocation};

/// Named per-trial timing tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrialEvent {
    SignalOn,
    SignalOff,
    TargetOn,
}

/// Trial state machine states. Transitions are driven by elapsed time
/// against the trial's ticket schedule, except for the signal phase which
/// also guards against double-toggling the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    WaitSignalOn,
    WaitSignalOff,
    WaitTargetOn,
    AwaitResponse,
    Feedback,
    Done,
}

/// Outcome of the response window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    Responded { key: TargetLocation, rt_ms: f64 },
    TimedOut,
}

impl Response {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Response::TimedOut)
    }

    pub fn label(&self) -> String {
        match self {
            Response::Responded { key, .. } => key.data_label().to_string(),
            Response::TimedOut => "timeout".to_string(),
        }
    }

    pub fn rt_ms(&self) -> Option<f64> {
        match self {
            Response::Responded { rt_ms, .. } => Some(*rt_ms),
            Response::TimedOut => None,
        }
    }

    /// Scores the response against the cue-compatibility rule: under an
    /// incompatible cue the correct key is the side opposite the target,
    /// under a compatible cue it is the target side itself. Timeouts have
    /// no accuracy.
    pub fn score(&self, cue: CueType, target: TargetLocation) -> Option<u8> {
        match self {
            Response::Responded { key, .. } => {
                let correct = match cue {
                    CueType::Compatible => *key == target,
                    CueType::Incompatible => *key != target,
                };
                Some(correct as u8)
            }
            Response::TimedOut => None,
        }
    }
}

/// Flat per-trial record appended to the results sink. `accuracy` and
/// `rt_ms` are jointly `None` exactly when the response timed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub block_num: usize,
    pub trial_num: usize,
    pub cue_type: CueType,
    pub soa_ms: u32,
    pub target_loc: TargetLocation,
    pub response: String,
    pub accuracy: Option<u8>,
    pub rt_ms: Option<f64>,
}
