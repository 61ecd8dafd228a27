use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use taskswitch_audio::{AudioBuffer, Mixer, SignalSource};
use taskswitch_core::{SessionPhase, TargetLocation, TrialState};
use taskswitch_experiment::{ExperimentConfig, Session};
use taskswitch_timing::{SimTimer, Timer};

/// Mixer double that records every call so tests can assert on the
/// signal toggling discipline.
#[derive(Clone, Default)]
struct RecordingMixer {
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingMixer {
    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, entry: &str) -> usize {
        self.log().iter().filter(|e| *e == entry).count()
    }
}

impl Mixer for RecordingMixer {
    fn play_background(&mut self, _buf: AudioBuffer, volume: f32) -> Result<()> {
        self.log.lock().unwrap().push(format!("background@{volume}"));
        Ok(())
    }
    fn set_background_volume(&mut self, volume: f32) {
        self.log.lock().unwrap().push(format!("volume@{volume}"));
    }
    fn load_signal(&mut self, signal: SignalSource) {
        let entry = match signal {
            SignalSource::VolumeBoost(_) => "load_boost",
            SignalSource::Chunk(_) => "load_chunk",
        };
        self.log.lock().unwrap().push(entry.to_string());
    }
    fn start_signal(&mut self) {
        self.log.lock().unwrap().push("signal_on".to_string());
    }
    fn stop_signal(&mut self) {
        self.log.lock().unwrap().push("signal_off".to_string());
    }
    fn stop_all(&mut self) {
        self.log.lock().unwrap().push("stop_all".to_string());
    }
}

fn test_config(soa_pool: Vec<u32>, results_path: &str) -> ExperimentConfig {
    ExperimentConfig {
        blocks_per_experiment: 1,
        trials_per_block: 16,
        // Degenerate range pins the target onset at exactly 2000 ms.
        target_onset_range_ms: (2000, 2000),
        soa_pool_ms: soa_pool,
        noise_duration_s: 0.05,
        noise_sample_rate: 8_000,
        results_path: results_path.to_string(),
        ..Default::default()
    }
}

fn start_session(
    config: ExperimentConfig,
    seed: u64,
) -> (Session<SimTimer, StdRng, RecordingMixer>, SimTimer, RecordingMixer) {
    let timer = SimTimer::new();
    let mixer = RecordingMixer::default();
    let mut session = Session::new(
        config,
        timer.clone(),
        StdRng::seed_from_u64(seed),
        mixer.clone(),
    )
    .unwrap();

    // Welcome gate, then passive calibration frames.
    session.handle_any_key();
    for _ in 0..120 {
        session.note_frame(Duration::from_micros(16_667));
    }
    session.update().unwrap();
    assert_eq!(session.phase(), SessionPhase::Block);
    assert!(session.current_plan().is_some());
    (session, timer, mixer)
}

fn step_to(
    session: &mut Session<SimTimer, StdRng, RecordingMixer>,
    timer: &SimTimer,
    trial_elapsed_ms: u64,
) {
    let target_ns = trial_elapsed_ms * 1_000_000;
    while timer.now() < target_ns {
        timer.advance_ms(1);
        session.update().unwrap();
    }
}

#[test]
fn signal_toggles_once_between_its_tickets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let (mut session, timer, mixer) =
        start_session(test_config(vec![200], path.to_str().unwrap()), 7);

    // Onset 2000 ms, SOA 200 ms: signal at 1800 ms, off at 1850 ms.
    let plan = session.current_plan().unwrap();
    assert_eq!(plan.soa_ms, 200);
    assert!((plan.target_onset_ms - 2000.0).abs() < 1e-6);

    step_to(&mut session, &timer, 1799);
    assert_eq!(session.current_state(), Some(TrialState::WaitSignalOn));
    assert_eq!(mixer.count("signal_on"), 0);

    step_to(&mut session, &timer, 1805);
    assert_eq!(session.current_state(), Some(TrialState::WaitSignalOff));
    assert_eq!(mixer.count("signal_on"), 1);
    assert_eq!(mixer.count("signal_off"), 0);

    step_to(&mut session, &timer, 1860);
    assert_eq!(session.current_state(), Some(TrialState::WaitTargetOn));
    assert_eq!(mixer.count("signal_off"), 1);

    step_to(&mut session, &timer, 2005);
    assert_eq!(session.current_state(), Some(TrialState::AwaitResponse));
    // No re-toggling after the window closed.
    assert_eq!(mixer.count("signal_on"), 1);
    assert_eq!(mixer.count("signal_off"), 1);
}

#[test]
fn response_is_scored_and_timed_from_target_onset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let (mut session, timer, _mixer) =
        start_session(test_config(vec![200], path.to_str().unwrap()), 11);

    let plan = *session.current_plan().unwrap();
    step_to(&mut session, &timer, 2005);
    assert_eq!(session.current_state(), Some(TrialState::AwaitResponse));

    // Respond 150 ms into the window with the key the cue rule rewards.
    timer.advance_ms(150);
    session.update().unwrap();
    let correct_key = match plan.cue_type {
        taskswitch_core::CueType::Compatible => plan.target_loc,
        taskswitch_core::CueType::Incompatible => plan.target_loc.opposite(),
    };
    session.handle_response(correct_key);
    assert_eq!(session.current_state(), Some(TrialState::Feedback));

    // A second keypress during feedback must not overwrite anything.
    session.handle_response(correct_key.opposite());

    // Feedback runs out, the trial is recorded and the next one starts.
    timer.advance_ms(1_001);
    session.update().unwrap();
    let record = &session.results()[0];
    assert_eq!(record.trial_num, 1);
    assert_eq!(record.accuracy, Some(1));
    assert_eq!(record.response, correct_key.data_label());
    let rt = record.rt_ms.unwrap();
    assert!((149.0..=156.0).contains(&rt), "rt {rt}");
}

#[test]
fn timeout_yields_na_accuracy_and_skips_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let (mut session, timer, _mixer) =
        start_session(test_config(vec![200], path.to_str().unwrap()), 3);

    step_to(&mut session, &timer, 2005);
    assert_eq!(session.current_state(), Some(TrialState::AwaitResponse));

    // Let the 1000 ms response window lapse without a keypress.
    step_to(&mut session, &timer, 3010);
    let record = &session.results()[0];
    assert_eq!(record.response, "timeout");
    assert_eq!(record.accuracy, None);
    assert_eq!(record.rt_ms, None);
    // Timeouts go straight to the next trial; trial 2 is already running.
    assert_eq!(session.trial_num(), 2);
}

#[test]
fn zero_soa_never_activates_the_signal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let (mut session, timer, mixer) =
        start_session(test_config(vec![0], path.to_str().unwrap()), 5);

    assert_eq!(session.current_plan().unwrap().soa_ms, 0);
    step_to(&mut session, &timer, 2010);
    assert_eq!(session.current_state(), Some(TrialState::AwaitResponse));
    assert_eq!(mixer.count("signal_on"), 0);
    assert_eq!(mixer.count("signal_off"), 0);
}

#[test]
fn abort_mid_signal_restores_the_mixer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let (mut session, timer, mixer) =
        start_session(test_config(vec![200], path.to_str().unwrap()), 13);

    step_to(&mut session, &timer, 1805);
    assert_eq!(session.current_state(), Some(TrialState::WaitSignalOff));
    assert_eq!(mixer.count("signal_on"), 1);

    session.abort();
    assert!(session.is_done());
    let log = mixer.log();
    assert_eq!(mixer.count("signal_off"), 1);
    assert_eq!(log.last().map(String::as_str), Some("stop_all"));
}

#[test]
fn welcome_frames_do_not_count_toward_calibration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let timer = SimTimer::new();
    let mut session = Session::new(
        test_config(vec![200], path.to_str().unwrap()),
        timer.clone(),
        StdRng::seed_from_u64(23),
        RecordingMixer::default(),
    )
    .unwrap();

    // Frames rendered while the welcome screen idles must not satisfy
    // the calibration budget.
    for _ in 0..200 {
        session.note_frame(Duration::from_micros(16_667));
    }
    session.handle_any_key();
    session.update().unwrap();
    assert_eq!(session.phase(), SessionPhase::Calibration);

    for _ in 0..120 {
        session.note_frame(Duration::from_micros(16_667));
    }
    session.update().unwrap();
    assert_eq!(session.phase(), SessionPhase::Block);
}

#[test]
fn keypress_outside_the_response_window_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let (mut session, timer, _mixer) =
        start_session(test_config(vec![200], path.to_str().unwrap()), 17);

    step_to(&mut session, &timer, 1000);
    session.handle_response(TargetLocation::Left);
    assert_eq!(session.current_state(), Some(TrialState::WaitSignalOn));
    assert!(session.results().is_empty());
}
