use tracing::Span;
use tracing_subscriber::EnvFilter;
use crate::config::loader::ObservabilityConfig;

/// Install the global subscriber. `RUST_LOG` overrides the configured filter.
pub fn init_tracing(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logs {
        builder.json().try_init().map_err(|e| anyhow::anyhow!(e))?;
    } else {
        builder.try_init().map_err(|e| anyhow::anyhow!(e))?;
    }

    Ok(())
}

pub fn trace_tick(sequence: u64, config_version: u64) -> Span {
    tracing::info_span!(
        "index_tick",
        sequence = sequence,
        config_version = config_version,
    )
}
