use anyhow::{Context, Result};
use rand::Rng;
use taskswitch_audio::{white_noise, Mixer, SignalSource};
use taskswitch_core::{
    DisplayState, FixationView, Response, SessionPhase, SignalType, TargetLocation, TrialEvent,
    TrialRecord, TrialState, TrialView,
};
use taskswitch_timing::{TicketSchedule, Timer};

use crate::config::{ExperimentConfig, SOA_RUN_LEN};
use crate::plan::{quantize_onset, TrialPlan};
use crate::results;
use crate::schedule::{balanced_targets, cue_for_trial};
use crate::soa::SoaPool;

pub const WELCOME_MESSAGE: &str = "When ready, press any key to begin the experiment.";
pub const CALIBRATION_MESSAGE: &str = "Preparing the display...";
pub const DEBRIEF_MESSAGE: &str = "Experiment complete. Thank you!";

/// Frames of passive display measurement before the first block.
const CALIBRATION_FRAMES: usize = 120;
/// Background noise plays at half volume; the exogenous signal doubles it.
const BACKGROUND_VOLUME: f32 = 0.5;
const SIGNAL_BOOST: f32 = 2.0;
const NOISE_AMPLITUDE: f32 = 0.5;

#[derive(Debug, Clone, Copy)]
struct Outcome {
    response: Response,
    accuracy: Option<u8>,
}

struct ActiveTrial {
    plan: TrialPlan,
    tickets: TicketSchedule<TrialEvent>,
    state: TrialState,
    start_ns: u64,
    response_open_ns: Option<u64>,
    feedback_start_ns: Option<u64>,
    outcome: Option<Outcome>,
    /// Guards the mixer against double-toggling; also consulted on abort
    /// so background volume is always restored.
    signal_active: bool,
}

/// One experiment session: welcome gate, display calibration, blocks of
/// trials, debrief. Owns the block-scoped SOA pool and the per-session
/// counterbalancing coin flip; everything time-dependent advances only in
/// `update`, polled once per frame.
pub struct Session<T, R, M>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
    M: Mixer,
{
    phase: SessionPhase,
    timer: T,
    rng: R,
    mixer: M,
    config: ExperimentConfig,
    green_first: bool,
    refresh_hz: f64,
    calibrated: bool,
    block_num: usize,
    trial_num: usize,
    soa_pool: SoaPool,
    current_soa: u32,
    targets: Vec<TargetLocation>,
    current: Option<ActiveTrial>,
    results: Vec<TrialRecord>,
    saved: bool,
    aborted: bool,
}

impl<T, R, M> Session<T, R, M>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
    M: Mixer,
{
    pub fn new(config: ExperimentConfig, timer: T, mut rng: R, mixer: M) -> Result<Self> {
        config.validate()?;
        let green_first = rng.random_bool(0.5);
        let soa_pool = SoaPool::new(&config.soa_pool_ms);
        let refresh_hz = config.refresh_rate_hz;
        Ok(Self {
            phase: SessionPhase::Welcome,
            timer,
            rng,
            mixer,
            config,
            green_first,
            refresh_hz,
            calibrated: false,
            block_num: 0,
            trial_num: 0,
            soa_pool,
            current_soa: 0,
            targets: Vec::new(),
            current: None,
            results: Vec::new(),
            saved: false,
            aborted: false,
        })
    }

    /// Any keypress dismisses the welcome screen.
    pub fn handle_any_key(&mut self) {
        if self.phase.is_welcome() {
            println!("Starting display calibration...");
            self.phase = SessionPhase::Calibration;
        }
    }

    /// Frame-time sample from the redraw loop. Only calibration-phase
    /// frames count; samples taken while the welcome screen idles would
    /// otherwise complete calibration before it is ever shown.
    pub fn note_frame(&mut self, d: std::time::Duration) {
        if self.phase.requires_calibration() {
            self.timer.record_frame(d);
        }
    }

    /// Advances whatever is time-driven: calibration completion, trial
    /// state transitions, response timeout, feedback expiry.
    pub fn update(&mut self) -> Result<()> {
        match self.phase {
            SessionPhase::Calibration => {
                if !self.calibrated && self.timer.frame_count() >= CALIBRATION_FRAMES {
                    self.apply_calibration();
                    self.phase = SessionPhase::Block;
                    self.start_block()?;
                }
            }
            SessionPhase::Block => self.update_trial()?,
            _ => {}
        }
        Ok(())
    }

    fn apply_calibration(&mut self) {
        let stats = self.timer.calibration_stats();
        // Use the measured refresh for onset quantization when it looks
        // sane; otherwise fall back to the configured rate.
        if stats.effective_fps.is_finite() && stats.effective_fps >= 10.0 {
            self.refresh_hz = stats.effective_fps;
        }
        println!(
            "Calibration: {:.3} ms/frame, {:.1} Hz, jitter {:.3} ms",
            stats.average_frame_time_ns / 1e6,
            stats.effective_fps,
            stats.jitter_ns / 1e6,
        );
        self.calibrated = true;
    }

    fn start_block(&mut self) -> Result<()> {
        self.block_num += 1;
        self.trial_num = 0;
        self.soa_pool.reset(&self.config.soa_pool_ms);
        self.targets = balanced_targets(&mut self.rng, self.config.trials_per_block);
        println!(
            "Block {} of {}",
            self.block_num, self.config.blocks_per_experiment
        );
        self.start_trial()
    }

    fn start_trial(&mut self) -> Result<()> {
        self.trial_num += 1;

        // A fresh SOA is drawn without replacement at the top of every
        // 16-trial run and reused for the rest of the run.
        if (self.trial_num - 1) % SOA_RUN_LEN == 0 {
            self.current_soa = self
                .soa_pool
                .draw(&mut self.rng)
                .with_context(|| format!("block {}, trial {}", self.block_num, self.trial_num))?;
        }

        let cue_type = cue_for_trial(self.trial_num, self.green_first);
        let target_loc = self
            .targets
            .pop()
            .context("target list exhausted before the block ended")?;
        let (lo, hi) = self.config.target_onset_range_ms;
        let target_onset_ms = quantize_onset(&mut self.rng, lo, hi, self.refresh_hz);

        let plan = TrialPlan {
            target_onset_ms,
            soa_ms: self.current_soa,
            cue_type,
            target_loc,
            signal_type: self.config.signal_type,
        };
        let tickets = plan.tickets(self.config.signal_duration_ms);

        // Synthesize this trial's noise and start it looping right away.
        let background = white_noise(
            &mut self.rng,
            self.config.noise_duration_s,
            self.config.noise_sample_rate,
            NOISE_AMPLITUDE,
        );
        let signal = match self.config.signal_type {
            SignalType::Exo => SignalSource::VolumeBoost(SIGNAL_BOOST),
            SignalType::Endo => SignalSource::Chunk(white_noise(
                &mut self.rng,
                self.config.noise_duration_s,
                self.config.noise_sample_rate,
                NOISE_AMPLITUDE,
            )),
        };
        self.mixer.load_signal(signal);
        self.mixer.play_background(background, BACKGROUND_VOLUME)?;

        println!(
            "trial {}: soa {} ms, onset {:.1} ms, target {}, cue {:?}",
            self.trial_num,
            plan.soa_ms,
            plan.target_onset_ms,
            plan.target_loc.data_label(),
            plan.cue_type,
        );

        self.current = Some(ActiveTrial {
            plan,
            tickets,
            state: TrialState::WaitSignalOn,
            start_ns: self.timer.now(),
            response_open_ns: None,
            feedback_start_ns: None,
            outcome: None,
            signal_active: false,
        });
        Ok(())
    }

    fn update_trial(&mut self) -> Result<()> {
        let now = self.timer.now();
        let mut trial_over = false;

        if let Some(trial) = &mut self.current {
            let elapsed = now.saturating_sub(trial.start_ns);
            match trial.state {
                TrialState::WaitSignalOn => {
                    if trial.tickets.after(TrialEvent::SignalOn, elapsed) {
                        if trial.plan.has_signal() {
                            self.mixer.start_signal();
                            trial.signal_active = true;
                            trial.state = TrialState::WaitSignalOff;
                        } else {
                            // Zero SOA: the signal window has zero width
                            // and never activates.
                            trial.state = TrialState::WaitTargetOn;
                        }
                    }
                }
                TrialState::WaitSignalOff => {
                    // Whichever of signal-off / target-on elapses first
                    // ends the signal; volume must always be restored.
                    if trial.tickets.after(TrialEvent::SignalOff, elapsed)
                        || trial.tickets.after(TrialEvent::TargetOn, elapsed)
                    {
                        if trial.signal_active {
                            self.mixer.stop_signal();
                            trial.signal_active = false;
                        }
                        trial.state = TrialState::WaitTargetOn;
                    }
                }
                TrialState::WaitTargetOn => {
                    if trial.tickets.after(TrialEvent::TargetOn, elapsed) {
                        trial.state = TrialState::AwaitResponse;
                        trial.response_open_ns = Some(now);
                    }
                }
                TrialState::AwaitResponse => {
                    let timeout_ns = self.config.response_timeout_ms * 1_000_000;
                    if let Some(open) = trial.response_open_ns {
                        if now.saturating_sub(open) >= timeout_ns {
                            trial.outcome = Some(Outcome {
                                response: Response::TimedOut,
                                accuracy: None,
                            });
                            // Timeouts skip feedback.
                            trial.state = TrialState::Done;
                            trial_over = true;
                        }
                    }
                }
                TrialState::Feedback => {
                    let feedback_ns = self.config.feedback_duration_ms * 1_000_000;
                    if let Some(start) = trial.feedback_start_ns {
                        if now.saturating_sub(start) >= feedback_ns {
                            trial.state = TrialState::Done;
                            trial_over = true;
                        }
                    }
                }
                TrialState::Done => {}
            }
        }

        if trial_over {
            self.finish_trial()?;
        }
        Ok(())
    }

    /// Keypress from the response collector. Ignored outside the response
    /// window.
    pub fn handle_response(&mut self, key: TargetLocation) {
        let now = self.timer.now();
        let Some(trial) = &mut self.current else {
            return;
        };
        if trial.state != TrialState::AwaitResponse {
            return;
        }
        let open = trial.response_open_ns.unwrap_or(now);
        let rt_ms = now.saturating_sub(open) as f64 / 1e6;
        let response = Response::Responded { key, rt_ms };
        let accuracy = response.score(trial.plan.cue_type, trial.plan.target_loc);
        println!(
            "response {} after {:.1} ms, accuracy {:?}",
            response.label(),
            rt_ms,
            accuracy
        );
        trial.outcome = Some(Outcome { response, accuracy });
        trial.state = TrialState::Feedback;
        trial.feedback_start_ns = Some(now);
    }

    fn finish_trial(&mut self) -> Result<()> {
        if let Some(trial) = self.current.take() {
            let outcome = trial.outcome.unwrap_or(Outcome {
                response: Response::TimedOut,
                accuracy: None,
            });
            self.results.push(TrialRecord {
                block_num: self.block_num,
                trial_num: self.trial_num,
                cue_type: trial.plan.cue_type,
                soa_ms: trial.plan.soa_ms,
                target_loc: trial.plan.target_loc,
                response: outcome.response.label(),
                accuracy: outcome.accuracy,
                rt_ms: outcome.response.rt_ms(),
            });
        }
        self.mixer.stop_all();

        if self.trial_num >= self.config.trials_per_block {
            if self.block_num >= self.config.blocks_per_experiment {
                self.phase = SessionPhase::Debrief;
                self.finish_session()?;
            } else {
                self.start_block()?;
            }
        } else {
            self.start_trial()?;
        }
        Ok(())
    }

    fn finish_session(&mut self) -> Result<()> {
        if let Some(summary) = results::summarize(&self.results) {
            println!(
                "Session done: {} trials, {} responded ({:.1}%)",
                summary.trials,
                summary.responded,
                summary.responded as f64 / summary.trials as f64 * 100.0,
            );
            if summary.responded > 0 {
                println!(
                    "Reaction times: mean {:.1} ms, min {:.1} ms, max {:.1} ms",
                    summary.mean_rt_ms, summary.min_rt_ms, summary.max_rt_ms,
                );
            }
        }
        results::save_records(&self.config.results_path, &self.results)?;
        println!("Results saved to {}", self.config.results_path);
        self.saved = true;
        Ok(())
    }

    /// Prompt quit/interrupt path: restores the mixer, keeps whatever
    /// results were collected.
    pub fn abort(&mut self) {
        if let Some(trial) = &mut self.current {
            if trial.signal_active {
                self.mixer.stop_signal();
                trial.signal_active = false;
            }
        }
        self.mixer.stop_all();
        self.aborted = true;
        if !self.results.is_empty() && !self.saved {
            if let Err(e) = results::save_records(&self.config.results_path, &self.results) {
                eprintln!("failed to save partial results: {e:#}");
            } else {
                println!("Partial results saved to {}", self.config.results_path);
            }
            self.saved = true;
        }
    }

    /// What the renderer should draw this frame.
    pub fn display_state(&self) -> DisplayState {
        match self.phase {
            SessionPhase::Welcome => DisplayState::Message(WELCOME_MESSAGE),
            SessionPhase::Calibration => DisplayState::Message(CALIBRATION_MESSAGE),
            SessionPhase::Debrief => DisplayState::Message(DEBRIEF_MESSAGE),
            SessionPhase::Block => match &self.current {
                Some(trial) => {
                    let target = (trial.state == TrialState::AwaitResponse)
                        .then_some(trial.plan.target_loc);
                    let fixation = match (trial.state, trial.outcome) {
                        (TrialState::Feedback, Some(outcome)) => match outcome.accuracy {
                            Some(1) => FixationView::ReactionTime(
                                outcome.response.rt_ms().unwrap_or(0.0) as u32,
                            ),
                            Some(_) => FixationView::Error,
                            None => FixationView::Normal,
                        },
                        _ => FixationView::Normal,
                    };
                    DisplayState::Trial(TrialView {
                        cue: trial.plan.cue_type,
                        target,
                        fixation,
                    })
                }
                None => DisplayState::Blank,
            },
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase.is_debrief() || self.aborted
    }

    pub fn green_first(&self) -> bool {
        self.green_first
    }

    pub fn block_num(&self) -> usize {
        self.block_num
    }

    pub fn trial_num(&self) -> usize {
        self.trial_num
    }

    pub fn results(&self) -> &[TrialRecord] {
        &self.results
    }

    pub fn current_plan(&self) -> Option<&TrialPlan> {
        self.current.as_ref().map(|t| &t.plan)
    }

    pub fn current_state(&self) -> Option<TrialState> {
        self.current.as_ref().map(|t| t.state)
    }

    pub fn soa_remaining(&self) -> &[u32] {
        self.soa_pool.remaining()
    }
}
