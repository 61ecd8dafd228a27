use serde::{Deserialize, Serialize};

/// Cue compatibility condition, signalled by the border colour around the
/// display (green or red, following Hunt & Klein's stimuli). Under a
/// compatible cue the correct key matches the target side; under an
/// incompatible cue it is the opposite side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueType {
    Compatible,
    Incompatible,
}

/// Side of the display a target (or response key) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetLocation {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

impl TargetLocation {
    pub fn data_label(&self) -> &'static str {
        match self {
            TargetLocation::Left => "L",
            TargetLocation::Right => "R",
        }
    }

    pub fn opposite(&self) -> TargetLocation {
        match self {
            TargetLocation::Left => TargetLocation::Right,
            TargetLocation::Right => TargetLocation::Left,
        }
    }
}

/// Whether the auditory warning signal is an exogenous volume step of the
/// background noise or an endogenous, separately synthesized noise chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Endo,
    Exo,
}
