use std::sync::Arc;
use std::time::Instant;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::Instrument;
use crate::basket::BasketBreakdown;
use crate::basket::aggregator::BasketAggregator;
use crate::config::IndexConfig;
use crate::config::handle::ConfigHandle;
use crate::error::{Error, Result};
use crate::history::journal::TickJournal;
use crate::history::retention::RetentionPolicy;
use crate::history::store::{CompactionReport, HistoryStore};
use crate::index::composer::{ComposeInputs, IndexComposer};
use crate::index::smoothing::{SmoothedPair, SmoothingEngine};
use crate::index::tick::{ConfigSnapshot, IndexTick};
use crate::index::volatility::VolatilityEstimator;
use crate::observability::metrics::{
    AVGX_VALUE, CLAMP_ACTIVATIONS, CONSECUTIVE_FAILURES, TICKS_COMMITTED, TICKS_SKIPPED, TICK_LATENCY,
    VOLATILITY_INDEX,
};
use crate::observability::tracing::trace_tick;
use crate::rate_source::{Completeness, RateSource};
use crate::types::timestamp::{MonotonicClock, Timestamp};
use crate::utils::helper::{alert_operations_team_critical, alert_operations_team_warning};

const RATE_SOURCE_PROVIDER: &str = "rate_source";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// No tick committed yet and not enough failures to call it degraded.
    Starting,
    Ok,
    Degraded,
}

/// Intermediate values a tick reached before it was skipped.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TickProgress {
    pub wf_raw: Option<f64>,
    pub wc_raw: Option<f64>,
    pub wf_smoothed: Option<f64>,
    pub wc_smoothed: Option<f64>,
    pub volatility_index: Option<f64>,
    pub avgx_final: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EngineHealth {
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_error_stage: Option<&'static str>,
    pub last_skip_progress: Option<TickProgress>,
    pub last_success: Option<Timestamp>,
    pub total_committed: u64,
    pub total_skipped: u64,
}

impl Default for EngineHealth {
    fn default() -> Self {
        EngineHealth {
            status: HealthStatus::Starting,
            consecutive_failures: 0,
            last_error: None,
            last_error_stage: None,
            last_skip_progress: None,
            last_success: None,
            total_committed: 0,
            total_skipped: 0,
        }
    }
}

impl EngineHealth {
    fn record_success(&mut self, at: Timestamp) {
        self.consecutive_failures = 0;
        self.last_success = Some(at);
        self.total_committed += 1;
        self.status = HealthStatus::Ok;
    }

    fn record_failure(&mut self, error: &Error, progress: &TickProgress, degraded_after: u32) {
        self.consecutive_failures += 1;
        self.last_error = Some(error.to_string());
        self.last_error_stage = Some(error.stage());
        self.last_skip_progress = Some(progress.clone());
        self.total_skipped += 1;

        if self.consecutive_failures >= degraded_after {
            self.status = HealthStatus::Degraded;
        }
    }
}

/// State shared with readers: the tick history, the latest basket
/// breakdown and the health signal.
pub struct PublishedIndex {
    pub history: HistoryStore,
    breakdown: RwLock<Option<BasketBreakdown>>,
    health: RwLock<EngineHealth>,
}

impl Default for PublishedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishedIndex {
    pub fn new() -> Self {
        PublishedIndex {
            history: HistoryStore::new(),
            breakdown: RwLock::new(None),
            health: RwLock::new(EngineHealth::default()),
        }
    }

    pub async fn breakdown(&self) -> Option<BasketBreakdown> {
        self.breakdown.read().await.clone()
    }

    pub async fn health(&self) -> EngineHealth {
        self.health.read().await.clone()
    }
}

#[derive(Clone, Debug)]
pub enum TickOutcome {
    Committed(IndexTick),
    Skipped {
        stage: &'static str,
        reason: String,
    },
}

impl TickOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TickOutcome::Committed(_))
    }
}

/// Owner of the pipeline state. One `run_tick` is one pass:
/// fetch → aggregate → smooth → estimate σ → compose → append.
///
/// ## Atomicity
/// Every stage up to composition is computed without touching engine
/// state. Smoothing, volatility window, clamp reference and sequence are
/// committed only after the tick is in the history, so a tick failing at
/// any stage leaves the engine exactly as the previous committed tick left it.
///
/// ## Reconfiguration
/// The config handle is read once at the start of each tick. A new version
/// updates alphas, window parameters and coverage policy before the pass
/// runs; smoothed values and the window contents carry over.
pub struct IndexEngine {
    source: Arc<dyn RateSource>,
    config: Arc<ConfigHandle>,
    applied_version: u64,
    aggregator: BasketAggregator,
    smoothing: SmoothingEngine,
    volatility: VolatilityEstimator,
    composer: IndexComposer,
    clock: MonotonicClock,
    sequence: u64,
    published: Arc<PublishedIndex>,
    journal: Option<TickJournal>,
}

impl IndexEngine {
    pub fn new(source: Arc<dyn RateSource>, config: Arc<ConfigHandle>) -> Self {
        let current = config.current();
        let engine = &current.engine;

        IndexEngine {
            source,
            applied_version: current.version,
            aggregator: BasketAggregator::from_config(engine),
            smoothing: SmoothingEngine::new(engine.alpha_f, engine.alpha_c),
            volatility: VolatilityEstimator::new(engine.window_size, engine.min_samples, engine.v_target),
            composer: IndexComposer::new(),
            clock: MonotonicClock::new(),
            sequence: 0,
            published: Arc::new(PublishedIndex::new()),
            journal: None,
            config,
        }
    }

    pub fn with_journal(mut self, journal: TickJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn published(&self) -> Arc<PublishedIndex> {
        Arc::clone(&self.published)
    }

    /// Tick period of the active configuration.
    pub fn tick_interval(&self) -> std::time::Duration {
        self.config.current().engine.tick_interval()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn smoothed_state(&self) -> Option<SmoothedPair> {
        self.smoothing.state()
    }

    pub fn volatility_samples(&self) -> usize {
        self.volatility.len()
    }

    pub fn last_final(&self) -> Option<f64> {
        self.composer.last_final()
    }

    /// Warm start from persisted ticks.
    ///
    /// Loads them into the history and rebuilds smoothing state, the clamp
    /// reference and the volatility window from the newest ticks.
    pub async fn restore(&mut self, ticks: Vec<IndexTick>) -> usize {
        let loaded = self.published.history.load(ticks).await;
        let snapshot = self.published.history.snapshot().await;

        let last = match snapshot.last() {
            Some(last) => last.clone(),
            None => return 0,
        };

        self.smoothing.restore(SmoothedPair {
            wf_smoothed: last.wf_smoothed,
            wc_smoothed: last.wc_smoothed,
        });
        self.composer.restore(last.avgx_final);

        let skip = snapshot.len().saturating_sub(self.config.current().engine.window_size);
        for tick in snapshot.iter().skip(skip) {
            self.volatility.record(tick.undamped_composite());
        }

        self.sequence = last.sequence;
        self.clock = MonotonicClock::starting_after(last.timestamp);

        tracing::info!(
            "Warm start from {} ticks: sequence={}, avgx={:.6}, window={}",
            loaded,
            self.sequence,
            last.avgx_final,
            self.volatility.len()
        );

        loaded
    }

    pub async fn run_tick(&mut self) -> TickOutcome {
        let started = Instant::now();
        let config = self.config.current();
        self.apply_config(&config);

        let sequence = self.sequence + 1;
        let span = trace_tick(sequence, config.version);
        let mut progress = TickProgress::default();
        let result = self.try_tick(&config, sequence, &mut progress).instrument(span).await;
        TICK_LATENCY.observe(started.elapsed().as_secs_f64());

        match result {
            Ok((tick, breakdown)) => {
                *self.published.breakdown.write().await = Some(breakdown);
                self.published.health.write().await.record_success(tick.timestamp);

                AVGX_VALUE.set(tick.avgx_final);
                VOLATILITY_INDEX.set(tick.volatility_index);
                TICKS_COMMITTED.inc();
                CONSECUTIVE_FAILURES.set(0);
                if tick.clamped {
                    CLAMP_ACTIVATIONS.inc();
                }

                tracing::info!(
                    "Tick {} committed: avgx={:.6}, wf={:.6}, wc={:.6}, sigma={:.4}, clamped={}",
                    tick.sequence,
                    tick.avgx_final,
                    tick.wf_smoothed,
                    tick.wc_adjusted,
                    tick.volatility_index,
                    tick.clamped
                );

                TickOutcome::Committed(tick)
            }
            Err(e) => {
                let stage = e.stage();
                let degraded_after = config.engine.degraded_after;

                let consecutive = {
                    let mut health = self.published.health.write().await;
                    health.record_failure(&e, &progress, degraded_after);
                    health.consecutive_failures
                };

                TICKS_SKIPPED.with_label_values(&[stage]).inc();
                CONSECUTIVE_FAILURES.set(i64::from(consecutive));

                tracing::warn!(
                    sequence,
                    stage,
                    consecutive,
                    config_version = config.version,
                    wf_raw = ?progress.wf_raw,
                    wc_raw = ?progress.wc_raw,
                    wf_smoothed = ?progress.wf_smoothed,
                    wc_smoothed = ?progress.wc_smoothed,
                    volatility_index = ?progress.volatility_index,
                    avgx_final = ?progress.avgx_final,
                    "Tick skipped: {}",
                    e
                );
                if consecutive == degraded_after {
                    alert_operations_team_warning(format!(
                        "AVGX degraded: {} consecutive ticks failed, last error: {}",
                        consecutive, e
                    ));
                }

                TickOutcome::Skipped {
                    stage,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_tick(
        &mut self,
        config: &IndexConfig,
        sequence: u64,
        progress: &mut TickProgress,
    ) -> Result<(IndexTick, BasketBreakdown)> {
        // Step 1: Fetch, bounded by the configured timeout
        let timeout = config.engine.fetch_timeout();
        let snapshot = tokio::time::timeout(timeout, self.source.fetch_snapshot(&config.weights))
            .await
            .map_err(|_| Error::UpstreamUnavailable {
                provider: RATE_SOURCE_PROVIDER.to_string(),
                reason: format!("no snapshot within {:?}", timeout),
            })??;

        if let Completeness::Partial { missing_fiat, missing_crypto } = snapshot.completeness() {
            tracing::warn!(
                "Partial snapshot: missing fiat {:?}, missing crypto {:?}",
                missing_fiat,
                missing_crypto
            );
        }

        // Step 2: Aggregate baskets
        let aggregate = self.aggregator.aggregate(&snapshot, &config.weights)?;
        progress.wf_raw = Some(aggregate.wf_raw);
        progress.wc_raw = Some(aggregate.wc_raw);

        // Step 3: Smooth (uncommitted)
        let smoothed = self.smoothing.smooth(aggregate.wf_raw, aggregate.wc_raw);
        progress.wf_smoothed = Some(smoothed.wf_smoothed);
        progress.wc_smoothed = Some(smoothed.wc_smoothed);

        // Step 4: Volatility over undamped composites including this one
        let undamped = (smoothed.wf_smoothed * smoothed.wc_smoothed).sqrt();
        let sigma = self.volatility.estimate(undamped);
        progress.volatility_index = Some(sigma);

        // Step 5: Compose and clamp
        let inputs = ComposeInputs {
            sequence,
            timestamp: self.clock.next(),
            wf_raw: aggregate.wf_raw,
            wc_raw: aggregate.wc_raw,
            smoothed,
        };
        let tick = self.composer.compose(&inputs, sigma, &ConfigSnapshot::from_config(config))?;
        progress.avgx_final = Some(tick.avgx_final);

        // Step 6: Append; nothing is committed before this succeeds
        self.published.history.append(tick.clone()).await?;
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&tick).await {
                alert_operations_team_critical(format!(
                    "Tick {} not journaled: {}",
                    tick.sequence, e
                ));
            }
        }

        // Step 7: Commit
        self.smoothing.commit(smoothed);
        self.volatility.record(undamped);
        self.composer.commit(&tick);
        self.sequence = sequence;

        let breakdown = BasketBreakdown::from_aggregate(tick.timestamp, aggregate);
        Ok((tick, breakdown))
    }

    /// Pick up a new configuration version. Called at tick start.
    pub fn apply_config(&mut self, config: &IndexConfig) {
        if config.version == self.applied_version {
            return;
        }

        let engine = &config.engine;
        self.smoothing.set_alphas(engine.alpha_f, engine.alpha_c);
        self.volatility.resize(engine.window_size, engine.min_samples, engine.v_target);
        self.aggregator = BasketAggregator::from_config(engine);

        tracing::info!(
            "Applied configuration version {} (was {})",
            config.version,
            self.applied_version
        );
        self.applied_version = config.version;
    }

    /// Apply retention to the history and rewrite the journal if anything changed.
    pub async fn compact_history(&self, policy: &RetentionPolicy, now: Timestamp) -> Result<CompactionReport> {
        let report = self.published.history.compact(policy, now).await;

        if report.changed() {
            if let Some(journal) = &self.journal {
                let snapshot = self.published.history.snapshot().await;
                journal.rewrite(snapshot.iter()).await?;
            }
            tracing::info!(
                "History compacted: {} -> {} ticks ({} expired, {} merged)",
                report.before,
                report.after,
                report.expired,
                report.merged
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::config::EngineConfig;
    use crate::config::weights::WeightTable;
    use crate::rate_source::{CryptoQuote, MockRateSource, RateSnapshot};

    fn snapshot_with(weights: &WeightTable, fiat: f64, crypto: f64) -> RateSnapshot {
        let fiat_quotes: HashMap<String, f64> = weights.fiat.iter()
            .map(|m| (m.code.clone(), fiat))
            .collect();
        let crypto_quotes: HashMap<String, CryptoQuote> = weights.crypto.iter()
            .map(|m| (m.symbol.clone(), CryptoQuote { price_usd: crypto, market_cap_usd: None }))
            .collect();
        RateSnapshot::from_quotes(weights, Timestamp::now(), &fiat_quotes, &crypto_quotes)
    }

    fn handle() -> Arc<ConfigHandle> {
        Arc::new(ConfigHandle::new(EngineConfig::default(), WeightTable::default()).unwrap())
    }

    fn steady_source() -> MockRateSource {
        let mut source = MockRateSource::new();
        source.expect_fetch_snapshot()
            .returning(|weights| Ok(snapshot_with(weights, 1.0, 100.0)));
        source
    }

    #[tokio::test]
    async fn test_tick_commits_and_publishes() {
        let mut engine = IndexEngine::new(Arc::new(steady_source()), handle());
        let published = engine.published();

        let outcome = engine.run_tick().await;

        let tick = match outcome {
            TickOutcome::Committed(tick) => tick,
            other => panic!("expected commit, got {:?}", other),
        };
        assert_eq!(tick.sequence, 1);
        assert!((tick.wf_raw - 1.0).abs() < 1e-12);
        assert!((tick.wc_raw - 100.0).abs() < 1e-9);
        assert!((tick.avgx_final - 10.0).abs() < 1e-9);
        assert_eq!(tick.volatility_index, 0.0);
        assert_eq!(tick.config.config_version, 1);

        assert_eq!(published.history.len().await, 1);
        assert_eq!(published.breakdown().await.map(|b| b.fiat.len()), Some(20));
        let health = published.health().await;
        assert_eq!(health.status, HealthStatus::Ok);
        assert_eq!(health.total_committed, 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_leaves_state_untouched() {
        let mut source = MockRateSource::new();
        source.expect_fetch_snapshot().returning(|_| {
            Err(Error::UpstreamUnavailable {
                provider: "fiat".to_string(),
                reason: "connection refused".to_string(),
            })
        });
        let mut engine = IndexEngine::new(Arc::new(source), handle());

        let outcome = engine.run_tick().await;

        assert!(matches!(outcome, TickOutcome::Skipped { stage: "fetch", .. }));
        assert_eq!(engine.sequence(), 0);
        assert_eq!(engine.smoothed_state(), None);
        assert_eq!(engine.volatility_samples(), 0);
        assert_eq!(engine.last_final(), None);
        assert!(engine.published().history.is_empty().await);

        let health = engine.published().health().await;
        assert_eq!(health.consecutive_failures, 1);
        assert_eq!(health.last_error_stage, Some("fetch"));
        assert_eq!(health.last_skip_progress, Some(TickProgress::default()));
        assert_eq!(health.status, HealthStatus::Starting);
    }

    #[tokio::test]
    async fn test_append_failure_keeps_intermediate_values() {
        let mut engine = IndexEngine::new(Arc::new(steady_source()), handle());
        let published = engine.published();

        // A tick far ahead of the engine clock makes the next append out of order
        let mut future = match engine.run_tick().await {
            TickOutcome::Committed(tick) => tick,
            other => panic!("expected commit, got {:?}", other),
        };
        future.sequence = 99;
        future.timestamp = Timestamp::from_millis(future.timestamp.as_millis() + 86_400_000);
        published.history.append(future).await.unwrap();

        let outcome = engine.run_tick().await;

        assert!(matches!(outcome, TickOutcome::Skipped { stage: "append", .. }));
        assert_eq!(engine.sequence(), 1);
        let progress = published.health().await.last_skip_progress.unwrap();
        assert!((progress.wf_raw.unwrap() - 1.0).abs() < 1e-12);
        assert!((progress.wc_raw.unwrap() - 100.0).abs() < 1e-9);
        assert!(progress.wc_smoothed.is_some());
        assert!(progress.volatility_index.is_some());
        assert!((progress.avgx_final.unwrap() - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_insufficient_coverage_skips_tick() {
        let mut source = MockRateSource::new();
        source.expect_fetch_snapshot().returning(|weights| {
            // Only BTC answered: 50% of the crypto basket
            let fiat_quotes: HashMap<String, f64> = weights.fiat.iter()
                .map(|m| (m.code.clone(), 1.0))
                .collect();
            let crypto_quotes = HashMap::from([(
                "BTC".to_string(),
                CryptoQuote { price_usd: 60_000.0, market_cap_usd: None },
            )]);
            Ok(RateSnapshot::from_quotes(weights, Timestamp::now(), &fiat_quotes, &crypto_quotes))
        });
        let mut engine = IndexEngine::new(Arc::new(source), handle());

        let outcome = engine.run_tick().await;

        assert!(matches!(outcome, TickOutcome::Skipped { stage: "aggregate", .. }));
        assert_eq!(engine.smoothed_state(), None);
    }

    #[tokio::test]
    async fn test_degraded_after_consecutive_failures() {
        let mut sequence = mockall::Sequence::new();
        let mut source = MockRateSource::new();
        source.expect_fetch_snapshot()
            .times(5)
            .in_sequence(&mut sequence)
            .returning(|_| {
                Err(Error::UpstreamUnavailable {
                    provider: "crypto".to_string(),
                    reason: "HTTP 429".to_string(),
                })
            });
        source.expect_fetch_snapshot()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|weights| Ok(snapshot_with(weights, 1.0, 100.0)));

        let mut engine = IndexEngine::new(Arc::new(source), handle());
        for _ in 0..5 {
            assert!(!engine.run_tick().await.is_committed());
        }
        let health = engine.published().health().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.consecutive_failures, 5);

        assert!(engine.run_tick().await.is_committed());
        let health = engine.published().health().await;
        assert_eq!(health.status, HealthStatus::Ok);
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.total_skipped, 5);
    }

    #[tokio::test]
    async fn test_config_swap_applies_at_next_tick() {
        let config = handle();
        let mut engine = IndexEngine::new(Arc::new(steady_source()), Arc::clone(&config));

        let first = engine.run_tick().await;
        assert!(first.is_committed());

        let engine_config = EngineConfig { alpha_f: 0.5, clamp_percent: 0.02, ..Default::default() };
        config.compare_and_swap(1, engine_config, WeightTable::default()).unwrap();

        match engine.run_tick().await {
            TickOutcome::Committed(tick) => {
                assert_eq!(tick.config.config_version, 2);
                assert_eq!(tick.config.alpha_f, 0.5);
                assert_eq!(tick.config.clamp_percent, 0.02);
                assert_eq!(tick.sequence, 2);
            }
            other => panic!("expected commit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_restore_continues_sequence_and_state() {
        let config = handle();
        let mut first = IndexEngine::new(Arc::new(steady_source()), Arc::clone(&config));
        for _ in 0..3 {
            assert!(first.run_tick().await.is_committed());
        }
        let persisted: Vec<IndexTick> = first.published().history.snapshot().await.into_iter().collect();
        let last = persisted[2].clone();

        let mut restarted = IndexEngine::new(Arc::new(steady_source()), config);
        assert_eq!(restarted.restore(persisted).await, 3);

        assert_eq!(restarted.sequence(), 3);
        assert_eq!(restarted.last_final(), Some(last.avgx_final));
        assert_eq!(restarted.volatility_samples(), 3);
        assert_eq!(
            restarted.smoothed_state(),
            Some(SmoothedPair { wf_smoothed: last.wf_smoothed, wc_smoothed: last.wc_smoothed })
        );

        match restarted.run_tick().await {
            TickOutcome::Committed(tick) => {
                assert_eq!(tick.sequence, 4);
                assert!(tick.timestamp > last.timestamp);
            }
            other => panic!("expected commit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compaction_without_journal() {
        let engine = IndexEngine::new(Arc::new(steady_source()), handle());
        let report = engine
            .compact_history(&RetentionPolicy::default(), Timestamp::now())
            .await
            .unwrap();
        assert!(!report.changed());
    }
}
