/// Session lifecycle phases. Blocks repeat; the session tracks the block
/// counter itself, so `next` only describes the forward path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Welcome,
    Calibration,
    Block,
    Debrief,
}

impl SessionPhase {
    pub fn allows_input(&self) -> bool {
        !matches!(self, SessionPhase::Calibration)
    }

    pub fn requires_calibration(&self) -> bool {
        matches!(self, SessionPhase::Calibration)
    }

    pub fn next(&self) -> Option<SessionPhase> {
        use SessionPhase::*;
        Some(match self {
            Welcome => Calibration,
            Calibration => Block,
            Block => Debrief,
            Debrief => return None,
        })
    }

    pub fn is_welcome(&self) -> bool {
        matches!(self, SessionPhase::Welcome)
    }

    pub fn is_block(&self) -> bool {
        matches!(self, SessionPhase::Block)
    }

    pub fn is_debrief(&self) -> bool {
        matches!(self, SessionPhase::Debrief)
    }
}
