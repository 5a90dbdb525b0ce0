use tokio::time::{interval, interval_at, Duration, Instant, Interval, MissedTickBehavior};
use crate::history::retention::RetentionPolicy;
use crate::index::engine::IndexEngine;
use crate::types::timestamp::Timestamp;

/// Drives the engine on the configured tick period and compacts history
/// on its own slower period. Ticks never overlap: a pass that overruns the
/// period makes the ticker skip the missed slots.
pub struct IndexTicker {
    engine: IndexEngine,
    retention: RetentionPolicy,
    compaction_interval: Duration,
}

impl IndexTicker {
    pub fn new(engine: IndexEngine, retention: RetentionPolicy, compaction_interval: Duration) -> Self {
        IndexTicker {
            engine,
            retention,
            compaction_interval,
        }
    }

    pub async fn run(mut self) {
        let mut period = self.engine.tick_interval();
        let mut ticker = skipping(interval(period));
        let mut compaction = skipping(interval(self.compaction_interval));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.engine.run_tick().await;

                    let configured = self.engine.tick_interval();
                    if configured != period {
                        tracing::info!("Tick interval changed: {:?} -> {:?}", period, configured);
                        period = configured;
                        ticker = skipping(interval_at(Instant::now() + period, period));
                    }
                }
                _ = compaction.tick() => {
                    if let Err(e) = self.engine.compact_history(&self.retention, Timestamp::now()).await {
                        tracing::error!("History compaction failed: {}", e);
                    }
                }
            }
        }
    }
}

fn skipping(mut interval: Interval) -> Interval {
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use crate::config::EngineConfig;
    use crate::config::handle::ConfigHandle;
    use crate::config::weights::WeightTable;
    use crate::rate_source::{CryptoQuote, MockRateSource, RateSnapshot};

    #[tokio::test]
    async fn test_first_tick_runs_immediately() {
        let mut source = MockRateSource::new();
        source.expect_fetch_snapshot().returning(|weights| {
            let fiat: HashMap<String, f64> = weights.fiat.iter().map(|m| (m.code.clone(), 1.0)).collect();
            let crypto: HashMap<String, CryptoQuote> = weights.crypto.iter()
                .map(|m| (m.symbol.clone(), CryptoQuote { price_usd: 4.0, market_cap_usd: None }))
                .collect();
            Ok(RateSnapshot::from_quotes(weights, Timestamp::now(), &fiat, &crypto))
        });
        let config = Arc::new(ConfigHandle::new(EngineConfig::default(), WeightTable::default()).unwrap());
        let engine = IndexEngine::new(Arc::new(source), config);
        let published = engine.published();

        let handle = tokio::spawn(IndexTicker::new(engine, RetentionPolicy::default(), Duration::from_secs(3_600)).run());
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        // 60s period: exactly the immediate first tick
        assert_eq!(published.history.len().await, 1);
        let latest = published.history.latest().await.unwrap();
        assert!((latest.avgx_final - 2.0).abs() < 1e-9);
    }
}
