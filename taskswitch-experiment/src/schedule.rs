use rand::seq::SliceRandom;
use rand::Rng;
use taskswitch_core::{CueType, TargetLocation};

use crate::config::CUE_RUN_LEN;

/// Cue-compatibility counterbalancing: 8-trial compatible runs alternate
/// with 8-trial incompatible runs, starting colour decided once per
/// session by the `green_first` coin flip. Pure function of the 1-indexed
/// trial number, no hidden state.
pub fn cue_for_trial(trial_num: usize, green_first: bool) -> CueType {
    debug_assert!(trial_num >= 1, "trial numbers are 1-indexed");
    let even_run = ((trial_num - 1) / CUE_RUN_LEN) % 2 == 0;
    if even_run == green_first {
        CueType::Compatible
    } else {
        CueType::Incompatible
    }
}

/// Shuffled, balanced left/right target list for one block.
pub fn balanced_targets<R: Rng>(rng: &mut R, trials: usize) -> Vec<TargetLocation> {
    let mut targets = Vec::with_capacity(trials);
    for i in 0..trials {
        targets.push(if i % 2 == 0 {
            TargetLocation::Left
        } else {
            TargetLocation::Right
        });
    }
    targets.shuffle(rng);
    targets
}
