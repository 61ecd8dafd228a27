use rand::Rng;
use taskswitch_core::{CueType, SignalType, TargetLocation, TrialEvent};
use taskswitch_timing::TicketSchedule;

/// Everything decided about a trial before it runs. Built once during
/// trial prep and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialPlan {
    pub target_onset_ms: f64,
    pub soa_ms: u32,
    pub cue_type: CueType,
    pub target_loc: TargetLocation,
    pub signal_type: SignalType,
}

/// Uniform draw over `[lo, hi]` ms quantized to whole display-refresh
/// intervals, since stimuli can only change on a flip. Bounds are
/// converted to flip counts, an integer flip count is drawn, then
/// converted back to ms. The lower bound is ceiled: the smallest draw
/// must never fall below `lo`, the SOA subtraction in `tickets` depends
/// on it even when calibration measured a rate above nominal.
pub fn quantize_onset<R: Rng>(rng: &mut R, lo_ms: u64, hi_ms: u64, refresh_hz: f64) -> f64 {
    let frame_ms = 1000.0 / refresh_hz;
    // 1e-6 flips of slack keeps exact divisions from rounding a flip
    // away (or in) on float noise.
    let min_flips = ((lo_ms as f64 / frame_ms) - 1e-6).ceil() as u64;
    let max_flips = (((hi_ms as f64 / frame_ms) + 1e-6).floor() as u64).max(min_flips);
    let flips = if max_flips > min_flips {
        rng.random_range(min_flips..max_flips)
    } else {
        min_flips
    };
    flips as f64 * frame_ms
}

fn ms_to_ns(ms: f64) -> u64 {
    (ms * 1e6).round() as u64
}

impl TrialPlan {
    pub fn has_signal(&self) -> bool {
        self.soa_ms > 0
    }

    /// Timestamped tickets relative to trial start: signal on at
    /// `target_onset - soa`, signal off a fixed duration later (zero
    /// duration when there is no signal), target at `target_onset`.
    /// Saturates rather than scheduling a signal before trial start.
    pub fn tickets(&self, signal_duration_ms: u32) -> TicketSchedule<TrialEvent> {
        let target_on = ms_to_ns(self.target_onset_ms);
        let signal_on = target_on.saturating_sub(u64::from(self.soa_ms) * 1_000_000);
        let signal_off = if self.has_signal() {
            signal_on + u64::from(signal_duration_ms) * 1_000_000
        } else {
            signal_on
        };

        let mut schedule = TicketSchedule::new();
        schedule.register(TrialEvent::SignalOn, signal_on);
        schedule.register(TrialEvent::SignalOff, signal_off);
        schedule.register(TrialEvent::TargetOn, target_on);
        schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn plan(soa_ms: u32, onset_ms: f64) -> TrialPlan {
        TrialPlan {
            target_onset_ms: onset_ms,
            soa_ms,
            cue_type: CueType::Compatible,
            target_loc: TargetLocation::Left,
            signal_type: SignalType::Exo,
        }
    }

    #[test]
    fn onset_stays_in_range_on_the_refresh_grid() {
        let mut rng = StdRng::seed_from_u64(21);
        let frame_ms = 1000.0 / 60.0;
        for _ in 0..500 {
            let onset = quantize_onset(&mut rng, 2000, 6000, 60.0);
            assert!((2000.0..=6000.0).contains(&onset), "onset {onset}");
            let flips = onset / frame_ms;
            assert!((flips - flips.round()).abs() < 1e-9, "off-grid onset {onset}");
        }
    }

    #[test]
    fn degenerate_range_pins_the_onset() {
        let mut rng = StdRng::seed_from_u64(4);
        let onset = quantize_onset(&mut rng, 3000, 3000, 60.0);
        assert!((onset - 3000.0).abs() < 1000.0 / 60.0);
    }

    #[test]
    fn ticket_offsets_follow_the_soa() {
        let tickets = plan(200, 3000.0).tickets(50);
        assert_eq!(tickets.offset_ns(TrialEvent::TargetOn), Some(3_000_000_000));
        assert_eq!(tickets.offset_ns(TrialEvent::SignalOn), Some(2_800_000_000));
        assert_eq!(
            tickets.offset_ns(TrialEvent::SignalOff),
            Some(2_850_000_000)
        );
    }

    #[test]
    fn measured_refresh_never_pulls_the_onset_below_the_minimum() {
        // A calibrated rate slightly above nominal shrinks the frame;
        // nearest-flip rounding used to land the minimum draw just under
        // `lo`, underflowing the SOA subtraction for the largest SOA.
        let mut rng = StdRng::seed_from_u64(8);
        for hz in [59.5, 60.02, 60.94, 120.3] {
            for _ in 0..200 {
                let onset = quantize_onset(&mut rng, 800, 800, hz);
                assert!(onset >= 800.0, "onset {onset} at {hz} Hz");

                let tickets = plan(800, onset).tickets(50);
                let on = tickets.offset_ns(TrialEvent::SignalOn).unwrap();
                let off = tickets.offset_ns(TrialEvent::SignalOff).unwrap();
                let target = tickets.offset_ns(TrialEvent::TargetOn).unwrap();
                assert!(on <= off && off <= target);
                assert_eq!(target - on, 800_000_000);
            }
        }
    }

    #[test]
    fn zero_soa_collapses_the_signal_window() {
        let tickets = plan(0, 2500.0).tickets(50);
        let on = tickets.offset_ns(TrialEvent::SignalOn).unwrap();
        let off = tickets.offset_ns(TrialEvent::SignalOff).unwrap();
        assert_eq!(on, off);
        assert_eq!(on, tickets.offset_ns(TrialEvent::TargetOn).unwrap());
    }
}
