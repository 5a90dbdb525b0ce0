use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use tracing::{error, info, warn};
use avgx_index::api::rest::{create_router, ApiState};
use avgx_index::config::handle::ConfigHandle;
use avgx_index::config::loader::AppConfig;
use avgx_index::history::journal::TickJournal;
use avgx_index::history::retention::RetentionPolicy;
use avgx_index::index::engine::IndexEngine;
use avgx_index::index::ticker::IndexTicker;
use avgx_index::observability::metrics::register_metrics;
use avgx_index::observability::tracing::init_tracing;
use avgx_index::rate_source::http::HttpRateSource;
use avgx_index::utils::helper::alert_operations_team_critical;
use avgx_index::utils::task_supervisor::TaskSupervisor;

const SUPERVISOR_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("AVGX_ENV").unwrap_or_else(|_| "development".to_string());
    let app = AppConfig::load(&env).context("failed to load configuration")?;

    init_tracing(&app.observability)?;
    register_metrics().context("failed to register metrics")?;
    info!("Starting AVGX index service (env={})", env);

    let config = Arc::new(ConfigHandle::new(app.engine.clone(), app.weights.clone())?);
    let source = Arc::new(HttpRateSource::new(&app.sources)?);
    let mut engine = IndexEngine::new(source, Arc::clone(&config));

    if let Some(path) = &app.history.journal_path {
        let journal = TickJournal::open(path).await
            .with_context(|| format!("failed to open tick journal {}", path))?;
        let ticks = journal.load().await
            .with_context(|| format!("failed to read tick journal {}", path))?;
        engine.restore(ticks).await;
        engine = engine.with_journal(journal);
    }

    let state = Arc::new(ApiState {
        published: engine.published(),
        config: Arc::clone(&config),
    });
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&app.server.bind_addr).await
        .with_context(|| format!("failed to bind {}", app.server.bind_addr))?;
    info!("AVGX API listening on {}", app.server.bind_addr);

    let ticker = IndexTicker::new(
        engine,
        RetentionPolicy::from(&app.history),
        app.history.compaction_interval(),
    );

    let mut supervisor = TaskSupervisor::new();
    supervisor.spawn("index_ticker", ticker.run());
    supervisor.spawn("api_server", async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("API server stopped: {}", e);
        }
    });
    #[cfg(unix)]
    supervisor.spawn("config_reloader", reload_on_sighup(Arc::clone(&config), env.clone()));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut health_check = tokio::time::interval(SUPERVISOR_CHECK_INTERVAL);

    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break Ok(());
            }
            _ = health_check.tick() => {
                if let Err(e) = supervisor.check_health().await {
                    alert_operations_team_critical(format!("AVGX service task failure: {}", e));
                    break Err(anyhow::Error::from(e));
                }
            }
        }
    };

    supervisor.shutdown_all().await;
    outcome
}

/// Re-read the layered configuration on SIGHUP and swap engine and weights
/// in. The engine picks the new version up at its next tick.
#[cfg(unix)]
async fn reload_on_sighup(config: Arc<ConfigHandle>, env: String) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = match signal(SignalKind::hangup()) {
        Ok(hangups) => hangups,
        Err(e) => {
            error!("Cannot listen for SIGHUP: {}", e);
            return;
        }
    };

    while hangups.recv().await.is_some() {
        let app = match AppConfig::load(&env) {
            Ok(app) => app,
            Err(e) => {
                warn!("Configuration reload rejected: {}", e);
                continue;
            }
        };

        match config.compare_and_swap(config.version(), app.engine, app.weights) {
            Ok(next) => info!("Configuration reloaded as version {}", next.version),
            Err(e) => warn!("Configuration reload rejected: {}", e),
        }
    }
}
