pub mod http;

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::config::weights::WeightTable;
use crate::error::{Error, Result};
use crate::types::timestamp::Timestamp;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub fiat_url: String,
    pub crypto_url: String,
    pub fiat_quote: FiatQuote,
    pub request_timeout_ms: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        SourcesConfig {
            fiat_url: "https://open.er-api.com/v6/latest/USD".to_string(),
            crypto_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            fiat_quote: FiatQuote::UnitsPerUsd,
            request_timeout_ms: 8_000,
        }
    }
}

impl SourcesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fiat_url.is_empty() {
            return Err(Error::invalid_config("sources.fiat_url", "must not be empty"));
        }
        if self.crypto_url.is_empty() {
            return Err(Error::invalid_config("sources.crypto_url", "must not be empty"));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::invalid_config("sources.request_timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

/// How the fiat provider quotes its rates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FiatQuote {
    /// `EUR: 0.92` means one USD buys 0.92 EUR; inverted on ingest.
    UnitsPerUsd,
    /// `EUR: 1.087` means one EUR is worth 1.087 USD.
    UsdPerUnit,
}

impl FiatQuote {
    /// USD value of one unit of the currency.
    pub fn normalize(&self, quoted: f64) -> f64 {
        match self {
            FiatQuote::UnitsPerUsd => 1.0 / quoted,
            FiatQuote::UsdPerUnit => quoted,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CryptoQuote {
    pub price_usd: f64,
    pub market_cap_usd: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Partial {
        missing_fiat: Vec<String>,
        missing_crypto: Vec<String>,
    },
}

/// One observation of every configured basket member.
///
/// Members the providers did not return (or returned unusable values for)
/// are present with `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct RateSnapshot {
    pub captured_at: Timestamp,
    pub fiat: BTreeMap<String, Option<f64>>,
    pub crypto: BTreeMap<String, Option<CryptoQuote>>,
}

impl RateSnapshot {
    /// Build a snapshot covering every member of `weights`.
    ///
    /// `fiat_quotes` must already be normalized to USD per unit and
    /// `crypto_quotes` keyed by symbol. Non-finite and non-positive values
    /// are recorded as missing.
    pub fn from_quotes(
        weights: &WeightTable,
        captured_at: Timestamp,
        fiat_quotes: &HashMap<String, f64>,
        crypto_quotes: &HashMap<String, CryptoQuote>,
    ) -> Self {
        let fiat = weights.fiat.iter()
            .map(|member| {
                let value = fiat_quotes.get(&member.code)
                    .copied()
                    .filter(|v| is_usable(*v));
                (member.code.clone(), value)
            })
            .collect();

        let crypto = weights.crypto.iter()
            .map(|member| {
                let quote = crypto_quotes.get(&member.symbol)
                    .copied()
                    .filter(|q| is_usable(q.price_usd));
                (member.symbol.clone(), quote)
            })
            .collect();

        RateSnapshot { captured_at, fiat, crypto }
    }

    pub fn fiat_rate(&self, code: &str) -> Option<f64> {
        self.fiat.get(code).copied().flatten()
    }

    pub fn crypto_quote(&self, symbol: &str) -> Option<CryptoQuote> {
        self.crypto.get(symbol).copied().flatten()
    }

    pub fn completeness(&self) -> Completeness {
        let missing_fiat: Vec<String> = self.fiat.iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.clone())
            .collect();
        let missing_crypto: Vec<String> = self.crypto.iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.clone())
            .collect();

        if missing_fiat.is_empty() && missing_crypto.is_empty() {
            Completeness::Complete
        } else {
            Completeness::Partial { missing_fiat, missing_crypto }
        }
    }
}

fn is_usable(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Upstream of the tick pipeline.
///
/// A total failure must be reported as `Error::UpstreamUnavailable`; a
/// partial answer is an `Ok` snapshot with absence markers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_snapshot(&self, weights: &WeightTable) -> Result<RateSnapshot>;
}
