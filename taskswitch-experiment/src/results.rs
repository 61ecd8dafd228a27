use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use taskswitch_core::TrialRecord;

/// Per-session reaction-time summary over the responded trials.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub trials: usize,
    pub responded: usize,
    pub mean_rt_ms: f64,
    pub min_rt_ms: f64,
    pub max_rt_ms: f64,
}

pub fn summarize(records: &[TrialRecord]) -> Option<Summary> {
    if records.is_empty() {
        return None;
    }
    let rts: Vec<f64> = records.iter().filter_map(|r| r.rt_ms).collect();
    if rts.is_empty() {
        return Some(Summary {
            trials: records.len(),
            responded: 0,
            mean_rt_ms: 0.0,
            min_rt_ms: 0.0,
            max_rt_ms: 0.0,
        });
    }
    Some(Summary {
        trials: records.len(),
        responded: rts.len(),
        mean_rt_ms: rts.iter().sum::<f64>() / rts.len() as f64,
        min_rt_ms: rts.iter().cloned().fold(f64::INFINITY, f64::min),
        max_rt_ms: rts.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    })
}

pub fn save_records(path: impl AsRef<Path>, records: &[TrialRecord]) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("creating result file {}", path.display()))?;
    serde_json::to_writer_pretty(file, records)
        .with_context(|| format!("writing results to {}", path.display()))?;
    Ok(())
}
