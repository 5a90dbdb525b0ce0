use lazy_static::lazy_static;
use prometheus::{
    Gauge, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Index metrics
    pub static ref AVGX_VALUE: Gauge = Gauge::new(
        "avgx_value",
        "Latest published AVGX index value"
    ).unwrap();

    pub static ref VOLATILITY_INDEX: Gauge = Gauge::new(
        "avgx_volatility_index",
        "Volatility index applied to the crypto basket on the latest tick"
    ).unwrap();

    // Tick metrics
    pub static ref TICKS_COMMITTED: IntCounter = IntCounter::new(
        "avgx_ticks_committed_total",
        "Total number of committed index ticks"
    ).unwrap();

    pub static ref TICKS_SKIPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("avgx_ticks_skipped_total", "Total number of skipped index ticks"),
        &["stage"]
    ).unwrap();

    pub static ref CLAMP_ACTIVATIONS: IntCounter = IntCounter::new(
        "avgx_clamp_activations_total",
        "Total number of ticks limited by the per-tick move clamp"
    ).unwrap();

    pub static ref CONSECUTIVE_FAILURES: IntGauge = IntGauge::new(
        "avgx_consecutive_failures",
        "Number of consecutive failed ticks"
    ).unwrap();

    // Latency metrics
    pub static ref TICK_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "avgx_tick_latency_seconds",
            "Full pipeline pass latency"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).unwrap();

    pub static ref UPSTREAM_FETCH_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "avgx_upstream_fetch_latency_seconds",
            "Upstream provider request latency"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["provider"]
    ).unwrap();
}

pub fn register_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(AVGX_VALUE.clone()))?;
    REGISTRY.register(Box::new(VOLATILITY_INDEX.clone()))?;
    REGISTRY.register(Box::new(TICKS_COMMITTED.clone()))?;
    REGISTRY.register(Box::new(TICKS_SKIPPED.clone()))?;
    REGISTRY.register(Box::new(CLAMP_ACTIVATIONS.clone()))?;
    REGISTRY.register(Box::new(CONSECUTIVE_FAILURES.clone()))?;
    REGISTRY.register(Box::new(TICK_LATENCY.clone()))?;
    REGISTRY.register(Box::new(UPSTREAM_FETCH_LATENCY.clone()))?;
    Ok(())
}

/// Prometheus text exposition of everything in `REGISTRY`.
pub fn render() -> prometheus::Result<String> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_metrics_render() {
        // Registration is global; a second call in the same process only reports duplicates.
        let _ = register_metrics();
        TICKS_SKIPPED.with_label_values(&["fetch"]).inc();

        let text = render().unwrap();
        assert!(text.contains("avgx_ticks_skipped_total"));
        assert!(text.contains("stage=\"fetch\""));
    }
}
