use serde::{Deserialize, Serialize};
use crate::config::IndexConfig;
use crate::types::ids::TickId;
use crate::types::timestamp::Timestamp;

/// Parameters a tick was computed with, embedded so every published value
/// can be reproduced from its own record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub config_version: u64,
    pub alpha_f: f64,
    pub alpha_c: f64,
    pub v_target: f64,
    pub clamp_percent: f64,
    pub window_size: usize,
    pub coverage_threshold: f64,
    pub renormalize: bool,
}

impl ConfigSnapshot {
    pub fn from_config(config: &IndexConfig) -> Self {
        ConfigSnapshot {
            config_version: config.version,
            alpha_f: config.engine.alpha_f,
            alpha_c: config.engine.alpha_c,
            v_target: config.engine.v_target,
            clamp_percent: config.engine.clamp_percent,
            window_size: config.engine.window_size,
            coverage_threshold: config.engine.coverage_threshold,
            renormalize: config.engine.renormalize,
        }
    }
}

/// Durable record of one committed pipeline pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexTick {
    pub tick_id: TickId,
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub wf_raw: f64,
    pub wf_smoothed: f64,
    pub wc_raw: f64,
    pub wc_smoothed: f64,
    pub volatility_index: f64,
    pub wc_adjusted: f64,
    pub avgx_candidate: f64,
    pub avgx_final: f64,
    pub clamped: bool,
    pub config: ConfigSnapshot,
}

impl IndexTick {
    /// Composite before volatility dampening, the series σ is measured on.
    pub fn undamped_composite(&self) -> f64 {
        (self.wf_smoothed * self.wc_smoothed).sqrt()
    }
}
