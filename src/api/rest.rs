use axum::{
    Router,
    routing::get,
    extract::{Path, State, Json},
    http::{header, Method, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use crate::basket::MemberReport;
use crate::config::handle::ConfigHandle;
use crate::history::Timeframe;
use crate::index::engine::{EngineHealth, HealthStatus, PublishedIndex};
use crate::index::tick::{ConfigSnapshot, IndexTick};
use crate::observability::metrics;
use crate::types::ids::TickId;

pub struct ApiState {
    // Read side of the engine
    pub published: Arc<PublishedIndex>,
    pub config: Arc<ConfigHandle>,
}

pub fn create_router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .route("/api/status", get(get_status))
        .route("/api/avgx", get(get_overview))
        .route("/api/avgx/index", get(get_index))
        .route("/api/avgx/chart/:timeframe", get(get_chart))
        .route("/api/avgx/fiat-rates", get(get_fiat_rates))
        .route("/api/avgx/crypto-prices", get(get_crypto_prices))
        .route("/api/v2/avgx/debug", get(get_debug))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: HealthStatus,
    consecutive_failures: u32,
    last_success: Option<String>,
}

async fn health_check(
    State(state): State<Arc<ApiState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let health = state.published.health().await;

    let code = match health.status {
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Starting | HealthStatus::Ok => StatusCode::OK,
    };

    (code, Json(HealthResponse {
        status: health.status,
        consecutive_failures: health.consecutive_failures,
        last_success: health.last_success.map(|ts| ts.to_rfc3339()),
    }))
}

#[derive(Serialize)]
struct StatusResponse {
    health: EngineHealth,
    config_version: u64,
    history_len: usize,
    latest_sequence: Option<u64>,
    latest_timestamp: Option<String>,
}

async fn get_status(
    State(state): State<Arc<ApiState>>,
) -> Json<StatusResponse> {
    let latest = state.published.history.latest().await;

    Json(StatusResponse {
        health: state.published.health().await,
        config_version: state.config.version(),
        history_len: state.published.history.len().await,
        latest_sequence: latest.as_ref().map(|t| t.sequence),
        latest_timestamp: latest.as_ref().map(|t| t.timestamp.to_rfc3339()),
    })
}

/// Dashboard index card; field names follow the existing client.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexResponse {
    value: f64,
    wf_value: f64,
    wc_value: f64,
    change24h: f64,
    timestamp: String,
}

impl IndexResponse {
    fn from_tick(tick: &IndexTick, change_24h: Option<f64>) -> Self {
        IndexResponse {
            value: tick.avgx_final,
            wf_value: tick.wf_smoothed,
            wc_value: tick.wc_adjusted,
            change24h: change_24h.unwrap_or(0.0),
            timestamp: tick.timestamp.to_rfc3339(),
        }
    }
}

async fn get_index(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<IndexResponse>, StatusCode> {
    let latest = state.published.history.latest().await
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let change = state.published.history.change_24h().await;

    Ok(Json(IndexResponse::from_tick(&latest, change)))
}

#[derive(Serialize)]
struct ChartPoint {
    timestamp: String,
    value: f64,
}

async fn get_chart(
    State(state): State<Arc<ApiState>>,
    Path(timeframe): Path<String>,
) -> Result<Json<Vec<ChartPoint>>, StatusCode> {
    let timeframe: Timeframe = timeframe.parse().map_err(|_| StatusCode::BAD_REQUEST)?;

    if state.published.history.is_empty().await {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let points = state.published.history.range(timeframe).await
        .iter()
        .map(|t| ChartPoint {
            timestamp: t.timestamp.to_rfc3339(),
            value: t.avgx_final,
        })
        .collect();

    Ok(Json(points))
}

#[derive(Serialize)]
struct FiatRateResponse {
    currency: String,
    name: String,
    rate: Option<f64>,
    weight: f64,
    included: bool,
}

impl From<&MemberReport> for FiatRateResponse {
    fn from(member: &MemberReport) -> Self {
        FiatRateResponse {
            currency: member.code.clone(),
            name: member.name.clone(),
            rate: member.value,
            weight: member.weight,
            included: member.included,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CryptoPriceResponse {
    id: Option<String>,
    symbol: String,
    name: String,
    price: Option<f64>,
    market_cap: Option<f64>,
    weight: f64,
    included: bool,
}

impl From<&MemberReport> for CryptoPriceResponse {
    fn from(member: &MemberReport) -> Self {
        CryptoPriceResponse {
            id: member.provider_id.clone(),
            symbol: member.code.clone(),
            name: member.name.clone(),
            price: member.value,
            market_cap: member.market_cap,
            weight: member.weight,
            included: member.included,
        }
    }
}

async fn get_fiat_rates(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<FiatRateResponse>>, StatusCode> {
    let breakdown = state.published.breakdown().await
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(breakdown.fiat.iter().map(FiatRateResponse::from).collect()))
}

async fn get_crypto_prices(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<CryptoPriceResponse>>, StatusCode> {
    let breakdown = state.published.breakdown().await
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(breakdown.crypto.iter().map(CryptoPriceResponse::from).collect()))
}

#[derive(Serialize)]
struct FiatBasketEntry {
    code: String,
    name: String,
    rate: Option<f64>,
    weight: f64,
    included: bool,
}

#[derive(Serialize)]
struct CryptoBasketEntry {
    id: Option<String>,
    symbol: String,
    name: String,
    price: Option<f64>,
    weight: f64,
    included: bool,
}

#[derive(Serialize)]
struct BasketBreakdownResponse {
    fiat_basket: Vec<FiatBasketEntry>,
    crypto_basket: Vec<CryptoBasketEntry>,
}

impl BasketBreakdownResponse {
    fn from_members(fiat: &[MemberReport], crypto: &[MemberReport]) -> Self {
        BasketBreakdownResponse {
            fiat_basket: fiat.iter()
                .map(|m| FiatBasketEntry {
                    code: m.code.clone(),
                    name: m.name.clone(),
                    rate: m.value,
                    weight: m.weight,
                    included: m.included,
                })
                .collect(),
            crypto_basket: crypto.iter()
                .map(|m| CryptoBasketEntry {
                    id: m.provider_id.clone(),
                    symbol: m.code.clone(),
                    name: m.name.clone(),
                    price: m.value,
                    weight: m.weight,
                    included: m.included,
                })
                .collect(),
        }
    }
}

/// Combined page view. Mixed naming (`avgx_usd`, `change24h`) is what the page reads.
#[derive(Serialize)]
struct OverviewResponse {
    avgx_usd: f64,
    wf_value: f64,
    wc_value: f64,
    change24h: f64,
    timestamp: String,
    volatility_index: f64,
    clamped: bool,
    breakdown: BasketBreakdownResponse,
}

async fn get_overview(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<OverviewResponse>, StatusCode> {
    let latest = state.published.history.latest().await
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let change = state.published.history.change_24h().await;

    let breakdown = match state.published.breakdown().await {
        Some(b) => BasketBreakdownResponse::from_members(&b.fiat, &b.crypto),
        // Warm start: history restored, no basket observed yet
        None => BasketBreakdownResponse::from_members(&[], &[]),
    };

    Ok(Json(OverviewResponse {
        avgx_usd: latest.avgx_final,
        wf_value: latest.wf_smoothed,
        wc_value: latest.wc_adjusted,
        change24h: change.unwrap_or(0.0),
        timestamp: latest.timestamp.to_rfc3339(),
        volatility_index: latest.volatility_index,
        clamped: latest.clamped,
        breakdown,
    }))
}

/// Full tick diagnostics with an RFC3339 timestamp.
#[derive(Serialize)]
struct DebugTick {
    tick_id: TickId,
    sequence: u64,
    timestamp: String,
    wf_raw: f64,
    wf_smoothed: f64,
    wc_raw: f64,
    wc_smoothed: f64,
    volatility_index: f64,
    wc_adjusted: f64,
    avgx_candidate: f64,
    avgx_final: f64,
    clamped: bool,
    config: ConfigSnapshot,
}

impl From<IndexTick> for DebugTick {
    fn from(tick: IndexTick) -> Self {
        DebugTick {
            tick_id: tick.tick_id,
            sequence: tick.sequence,
            timestamp: tick.timestamp.to_rfc3339(),
            wf_raw: tick.wf_raw,
            wf_smoothed: tick.wf_smoothed,
            wc_raw: tick.wc_raw,
            wc_smoothed: tick.wc_smoothed,
            volatility_index: tick.volatility_index,
            wc_adjusted: tick.wc_adjusted,
            avgx_candidate: tick.avgx_candidate,
            avgx_final: tick.avgx_final,
            clamped: tick.clamped,
            config: tick.config,
        }
    }
}

#[derive(Serialize)]
struct DebugResponse {
    data: DebugTick,
    timestamp: String,
}

async fn get_debug(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<DebugResponse>, StatusCode> {
    let latest = state.published.history.latest().await
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    let data = DebugTick::from(latest);
    let timestamp = data.timestamp.clone();

    Ok(Json(DebugResponse { data, timestamp }))
}

async fn prometheus_metrics() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                String::new(),
            )
        }
    }
}
