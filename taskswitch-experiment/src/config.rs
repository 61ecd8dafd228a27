use std::fs::File;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use taskswitch_core::SignalType;

/// Trials are grouped into fixed-SOA runs of this length; the cue colour
/// alternates every half run.
pub const SOA_RUN_LEN: usize = 16;
pub const CUE_RUN_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub blocks_per_experiment: usize,
    pub trials_per_block: usize,
    /// Interval between trial start and target onset, in ms; drawn
    /// uniformly each trial and quantized to the display refresh.
    pub target_onset_range_ms: (u64, u64),
    /// Signal-target SOAs in ms; 0 means no warning signal.
    pub soa_pool_ms: Vec<u32>,
    pub signal_duration_ms: u32,
    pub signal_type: SignalType,
    pub response_timeout_ms: u64,
    pub feedback_duration_ms: u64,
    /// Fallback refresh rate when no calibration measurement is available.
    pub refresh_rate_hz: f64,
    pub noise_duration_s: f32,
    pub noise_sample_rate: u32,
    pub results_path: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            blocks_per_experiment: 2,
            trials_per_block: 64,
            target_onset_range_ms: (2000, 6000),
            soa_pool_ms: vec![0, 50, 200, 800],
            signal_duration_ms: 50,
            signal_type: SignalType::Exo,
            response_timeout_ms: 1000,
            feedback_duration_ms: 1000,
            refresh_rate_hz: 60.0,
            noise_duration_s: 12.0,
            noise_sample_rate: 22_050,
            results_path: "taskswitch_results.json".to_string(),
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let config: Self = serde_json::from_reader(file)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn runs_per_block(&self) -> usize {
        self.trials_per_block / SOA_RUN_LEN
    }

    /// Fails fast on configurations that would otherwise produce
    /// degenerate trials mid-block.
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = self.target_onset_range_ms;
        ensure!(lo <= hi, "target onset range upper ({hi}) < lower ({lo})");
        ensure!(self.blocks_per_experiment > 0, "need at least one block");
        ensure!(
            self.trials_per_block > 0 && self.trials_per_block % SOA_RUN_LEN == 0,
            "trials_per_block ({}) must be a positive multiple of the {SOA_RUN_LEN}-trial SOA run",
            self.trials_per_block
        );
        ensure!(!self.soa_pool_ms.is_empty(), "SOA pool is empty");
        let mut seen = self.soa_pool_ms.clone();
        seen.sort_unstable();
        seen.dedup();
        ensure!(
            seen.len() == self.soa_pool_ms.len(),
            "SOA pool contains duplicate values"
        );
        ensure!(
            self.runs_per_block() <= self.soa_pool_ms.len(),
            "block needs {} SOA values but the pool only holds {}",
            self.runs_per_block(),
            self.soa_pool_ms.len()
        );
        // A signal scheduled before trial start cannot fire.
        let max_soa = *self.soa_pool_ms.iter().max().unwrap() as u64;
        ensure!(
            max_soa <= lo,
            "largest SOA ({max_soa} ms) exceeds the minimum target onset ({lo} ms)"
        );
        ensure!(self.response_timeout_ms > 0, "response timeout must be > 0");
        ensure!(
            self.refresh_rate_hz.is_finite() && self.refresh_rate_hz > 0.0,
            "refresh rate must be a positive number"
        );
        ensure!(
            self.noise_duration_s > 0.0 && self.noise_sample_rate > 0,
            "noise buffer must have a positive duration and sample rate"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ExperimentConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_onset_range_is_rejected() {
        let config = ExperimentConfig {
            target_onset_range_ms: (6000, 2000),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn trials_must_fill_whole_soa_runs() {
        let config = ExperimentConfig {
            trials_per_block: 60,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn pool_must_cover_all_runs() {
        let config = ExperimentConfig {
            trials_per_block: 64,
            soa_pool_ms: vec![0, 50, 200],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn soa_larger_than_min_onset_is_rejected() {
        let config = ExperimentConfig {
            target_onset_range_ms: (500, 6000),
            soa_pool_ms: vec![0, 800],
            trials_per_block: 32,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
