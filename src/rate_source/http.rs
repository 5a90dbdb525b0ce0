use std::collections::HashMap;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use serde::Deserialize;
use crate::config::weights::WeightTable;
use crate::error::{Error, Result};
use crate::observability::metrics::UPSTREAM_FETCH_LATENCY;
use crate::rate_source::{CryptoQuote, FiatQuote, RateSnapshot, RateSource, SourcesConfig};
use crate::types::timestamp::Timestamp;

const FIAT_PROVIDER: &str = "fiat";
const CRYPTO_PROVIDER: &str = "crypto";

/// Polls a fiat rates endpoint and a CoinGecko-style simple price endpoint.
pub struct HttpRateSource {
    client: reqwest::Client,
    fiat_url: String,
    crypto_url: String,
    fiat_quote: FiatQuote,
    timeout: Duration,
}

impl HttpRateSource {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(HttpRateSource {
            client,
            fiat_url: config.fiat_url.clone(),
            crypto_url: config.crypto_url.clone(),
            fiat_quote: config.fiat_quote,
            timeout: config.request_timeout(),
        })
    }

    /// USD value per unit, keyed by currency code.
    async fn fetch_fiat(&self) -> Result<HashMap<String, f64>> {
        let started = Instant::now();
        let response: FiatRatesResponse = self.get_json(FIAT_PROVIDER, self.client.get(&self.fiat_url)).await?;
        UPSTREAM_FETCH_LATENCY.with_label_values(&[FIAT_PROVIDER]).observe(started.elapsed().as_secs_f64());

        Ok(response.rates.into_iter()
            .filter(|(_, quoted)| quoted.is_finite() && *quoted > 0.0)
            .map(|(code, quoted)| (code.to_uppercase(), self.fiat_quote.normalize(quoted)))
            .collect())
    }

    /// Quotes keyed by basket symbol.
    async fn fetch_crypto(&self, weights: &WeightTable) -> Result<HashMap<String, CryptoQuote>> {
        let ids = weights.crypto.iter()
            .map(|m| m.id.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let request = self.client.get(&self.crypto_url).query(&[
            ("ids", ids.as_str()),
            ("vs_currencies", "usd"),
            ("include_market_cap", "true"),
        ]);

        let started = Instant::now();
        let response: HashMap<String, SimplePrice> = self.get_json(CRYPTO_PROVIDER, request).await?;
        UPSTREAM_FETCH_LATENCY.with_label_values(&[CRYPTO_PROVIDER]).observe(started.elapsed().as_secs_f64());

        Ok(response.into_iter()
            .filter_map(|(id, price)| {
                let member = weights.crypto_by_id(&id)?;
                let price_usd = price.usd?;
                Some((member.symbol.clone(), CryptoQuote {
                    price_usd,
                    market_cap_usd: price.usd_market_cap,
                }))
            })
            .collect())
    }

    async fn get_json<T>(&self, provider: &str, request: reqwest::RequestBuilder) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let call = async {
            request.send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| upstream(provider, e.to_string()))?
                .json::<T>()
                .await
                .map_err(|e| upstream(provider, format!("malformed body: {}", e)))
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| upstream(provider, format!("timed out after {:?}", self.timeout)))?
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_snapshot(&self, weights: &WeightTable) -> Result<RateSnapshot> {
        // First failure cancels the other request
        let (fiat, crypto) = futures::try_join!(self.fetch_fiat(), self.fetch_crypto(weights))?;

        Ok(RateSnapshot::from_quotes(weights, Timestamp::now(), &fiat, &crypto))
    }
}

fn upstream(provider: &str, reason: String) -> Error {
    Error::UpstreamUnavailable {
        provider: provider.to_string(),
        reason,
    }
}

#[derive(Deserialize)]
struct FiatRatesResponse {
    rates: HashMap<String, f64>,
}

#[derive(Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
    usd_market_cap: Option<f64>,
}
