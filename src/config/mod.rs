use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::config::weights::WeightTable;

pub mod weights;
pub mod handle;
pub mod loader;

/// Tuning constants of the index pipeline.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub alpha_f: f64,
    pub alpha_c: f64,
    pub v_target: f64,
    pub clamp_percent: f64,
    pub window_size: usize,
    pub min_samples: usize,
    pub coverage_threshold: f64,
    pub renormalize: bool,
    pub tick_interval_secs: u64,
    pub fetch_timeout_ms: u64,
    pub degraded_after: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            alpha_f: 0.10,
            alpha_c: 0.05,
            v_target: 0.01,            // 1% return dispersion saturates σ
            clamp_percent: 0.015,      // ±1.5% per tick
            window_size: 60,
            min_samples: 10,
            coverage_threshold: 0.8,
            renormalize: true,
            tick_interval_secs: 60,
            fetch_timeout_ms: 10_000,
            degraded_after: 5,
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        check_unit_interval("engine.alpha_f", self.alpha_f, false)?;
        check_unit_interval("engine.alpha_c", self.alpha_c, false)?;
        check_unit_interval("engine.coverage_threshold", self.coverage_threshold, true)?;

        if !self.v_target.is_finite() || self.v_target < 0.0 {
            return Err(Error::invalid_config("engine.v_target", "must be a finite value >= 0"));
        }
        if !self.clamp_percent.is_finite() || self.clamp_percent <= 0.0 || self.clamp_percent >= 1.0 {
            return Err(Error::invalid_config("engine.clamp_percent", "must be in (0, 1)"));
        }
        if self.window_size < 2 {
            return Err(Error::invalid_config("engine.window_size", "must be at least 2"));
        }
        if self.min_samples < 2 || self.min_samples > self.window_size {
            return Err(Error::invalid_config(
                "engine.min_samples",
                format!("must be in [2, {}]", self.window_size),
            ));
        }
        if self.tick_interval_secs == 0 {
            return Err(Error::invalid_config("engine.tick_interval_secs", "must be positive"));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(Error::invalid_config("engine.fetch_timeout_ms", "must be positive"));
        }
        if self.degraded_after == 0 {
            return Err(Error::invalid_config("engine.degraded_after", "must be positive"));
        }

        Ok(())
    }
}

/// Immutable unit of configuration swapped in at tick boundaries.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexConfig {
    pub version: u64,
    pub engine: EngineConfig,
    pub weights: WeightTable,
}

impl IndexConfig {
    pub fn new(version: u64, engine: EngineConfig, weights: WeightTable) -> Result<Self> {
        engine.validate()?;
        weights.validate()?;
        Ok(IndexConfig { version, engine, weights })
    }
}

/// `lower_inclusive` selects between [0,1] and (0,1].
fn check_unit_interval(field: &str, value: f64, lower_inclusive: bool) -> Result<()> {
    let lower_ok = if lower_inclusive { value >= 0.0 } else { value > 0.0 };
    if !value.is_finite() || !lower_ok || value > 1.0 {
        let range = if lower_inclusive { "[0, 1]" } else { "(0, 1]" };
        return Err(Error::invalid_config(field, format!("{} is outside {}", value, range)));
    }
    Ok(())
}
