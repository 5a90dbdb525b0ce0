#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use avgx_index::config::EngineConfig;
use avgx_index::config::handle::ConfigHandle;
use avgx_index::config::weights::WeightTable;
use avgx_index::error::{Error, Result};
use avgx_index::rate_source::{CryptoQuote, RateSnapshot, RateSource};
use avgx_index::types::timestamp::Timestamp;

/// One scripted answer of the rate source.
#[derive(Clone, Debug)]
pub enum Step {
    /// Every fiat member quoted at `fiat` USD, every crypto member at `crypto` USD.
    Uniform { fiat: f64, crypto: f64 },
    Fail,
    /// Never answers within any reasonable timeout.
    Stall(Duration),
}

/// Rate source replaying a fixed script; an exhausted script fails.
pub struct ScriptedRateSource {
    steps: Mutex<VecDeque<Step>>,
}

impl ScriptedRateSource {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(ScriptedRateSource {
            steps: Mutex::new(steps.into_iter().collect()),
        })
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().unwrap().len()
    }
}

#[async_trait]
impl RateSource for ScriptedRateSource {
    async fn fetch_snapshot(&self, weights: &WeightTable) -> Result<RateSnapshot> {
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Fail);

        match step {
            Step::Uniform { fiat, crypto } => Ok(uniform_snapshot(weights, fiat, crypto)),
            Step::Fail => Err(Error::UpstreamUnavailable {
                provider: "scripted".to_string(),
                reason: "script step failed".to_string(),
            }),
            Step::Stall(duration) => {
                tokio::time::sleep(duration).await;
                Ok(uniform_snapshot(weights, 1.0, 1.0))
            }
        }
    }
}

pub fn uniform_snapshot(weights: &WeightTable, fiat: f64, crypto: f64) -> RateSnapshot {
    let fiat_quotes: HashMap<String, f64> = weights.fiat.iter()
        .map(|m| (m.code.clone(), fiat))
        .collect();
    let crypto_quotes: HashMap<String, CryptoQuote> = weights.crypto.iter()
        .map(|m| (m.symbol.clone(), CryptoQuote { price_usd: crypto, market_cap_usd: Some(crypto * 1e6) }))
        .collect();
    RateSnapshot::from_quotes(weights, Timestamp::now(), &fiat_quotes, &crypto_quotes)
}

pub fn config_handle(engine: EngineConfig) -> Arc<ConfigHandle> {
    Arc::new(ConfigHandle::new(engine, WeightTable::default()).unwrap())
}

pub fn uniform(fiat: f64, crypto: f64) -> Step {
    Step::Uniform { fiat, crypto }
}
