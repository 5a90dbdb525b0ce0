use crate::error::{Error, Result};
use crate::index::smoothing::SmoothedPair;
use crate::index::tick::{ConfigSnapshot, IndexTick};
use crate::types::ids::TickId;
use crate::types::timestamp::Timestamp;

/// Everything the composer needs from the earlier pipeline stages.
#[derive(Clone, Copy, Debug)]
pub struct ComposeInputs {
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub wf_raw: f64,
    pub wc_raw: f64,
    pub smoothed: SmoothedPair,
}

/// Limit `candidate` to `prev × (1 ± clamp_percent)`.
///
/// Returns the published value and whether the clamp engaged. A missing or
/// non-positive reference disables clamping.
pub fn clamp_move(prev: Option<f64>, candidate: f64, clamp_percent: f64) -> (f64, bool) {
    let prev = match prev {
        Some(prev) if prev > 0.0 => prev,
        _ => return (candidate, false),
    };

    let delta = (candidate - prev) / prev;
    if delta.abs() > clamp_percent {
        (prev * (1.0 + clamp_percent.copysign(delta)), true)
    } else {
        (candidate, false)
    }
}

/// Final stage: volatility adjustment, geometric mean, per-tick clamp.
#[derive(Clone, Debug, Default)]
pub struct IndexComposer {
    last_final: Option<f64>,
}

impl IndexComposer {
    pub fn new() -> Self {
        IndexComposer { last_final: None }
    }

    pub fn compose(&self, inputs: &ComposeInputs, sigma: f64, config: &ConfigSnapshot) -> Result<IndexTick> {
        let SmoothedPair { wf_smoothed, wc_smoothed } = inputs.smoothed;

        // Step 1: Dampen the crypto basket under stress
        let wc_adjusted = wc_smoothed * (1.0 - sigma);

        // Step 2: Geometric mean, real-valued only for non-negative operands
        let operands_valid = wf_smoothed.is_finite()
            && wc_adjusted.is_finite()
            && wf_smoothed >= 0.0
            && wc_adjusted >= 0.0;
        if !operands_valid {
            return Err(Error::InvalidComposite { wf_smoothed, wc_adjusted });
        }
        let avgx_candidate = (wf_smoothed * wc_adjusted).sqrt();

        // Step 3: Per-tick move clamp against the last committed value
        let (avgx_final, clamped) = clamp_move(self.last_final, avgx_candidate, config.clamp_percent);

        Ok(IndexTick {
            tick_id: TickId::new(),
            sequence: inputs.sequence,
            timestamp: inputs.timestamp,
            wf_raw: inputs.wf_raw,
            wf_smoothed,
            wc_raw: inputs.wc_raw,
            wc_smoothed,
            volatility_index: sigma,
            wc_adjusted,
            avgx_candidate,
            avgx_final,
            clamped,
            config: config.clone(),
        })
    }

    pub fn commit(&mut self, tick: &IndexTick) {
        self.last_final = Some(tick.avgx_final);
    }

    pub fn restore(&mut self, last_final: f64) {
        self.last_final = Some(last_final);
    }

    pub fn last_final(&self) -> Option<f64> {
        self.last_final
    }
}
