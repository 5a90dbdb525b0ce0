use avgx_index::config::weights::{CryptoMember, FiatMember, WeightTable};
use avgx_index::error::Error;
use avgx_index::rate_source::http::HttpRateSource;
use avgx_index::rate_source::{Completeness, FiatQuote, RateSource, SourcesConfig};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn weights() -> WeightTable {
    WeightTable {
        fiat: vec![
            FiatMember { code: "USD".to_string(), name: "US Dollar".to_string(), weight: 0.5 },
            FiatMember { code: "EUR".to_string(), name: "Euro".to_string(), weight: 0.3 },
            FiatMember { code: "JPY".to_string(), name: "Japanese Yen".to_string(), weight: 0.2 },
        ],
        crypto: vec![
            CryptoMember {
                symbol: "BTC".to_string(),
                id: "bitcoin".to_string(),
                name: "Bitcoin".to_string(),
                weight: 0.6,
            },
            CryptoMember {
                symbol: "ETH".to_string(),
                id: "ethereum".to_string(),
                name: "Ethereum".to_string(),
                weight: 0.4,
            },
        ],
    }
}

fn sources(server: &MockServer) -> SourcesConfig {
    SourcesConfig {
        fiat_url: format!("{}/v6/latest/USD", server.uri()),
        crypto_url: format!("{}/api/v3/simple/price", server.uri()),
        fiat_quote: FiatQuote::UnitsPerUsd,
        request_timeout_ms: 2_000,
    }
}

async fn mount_fiat(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v6/latest/USD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_snapshot_is_normalized_to_usd() {
    let server = MockServer::start().await;
    mount_fiat(&server, json!({
        "result": "success",
        "base_code": "USD",
        "rates": { "USD": 1.0, "EUR": 0.8, "JPY": 160.0, "GBP": 0.79 }
    })).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/simple/price"))
        .and(query_param("vs_currencies", "usd"))
        .and(query_param("include_market_cap", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bitcoin": { "usd": 65000.0, "usd_market_cap": 1.28e12 },
            "ethereum": { "usd": 3200.0, "usd_market_cap": 3.85e11 }
        })))
        .mount(&server)
        .await;

    let source = HttpRateSource::new(&sources(&server)).unwrap();
    let snapshot = source.fetch_snapshot(&weights()).await.unwrap();

    assert_eq!(snapshot.completeness(), Completeness::Complete);
    assert_eq!(snapshot.fiat_rate("USD"), Some(1.0));
    assert_eq!(snapshot.fiat_rate("EUR"), Some(1.25));
    assert_eq!(snapshot.fiat_rate("JPY"), Some(1.0 / 160.0));
    // Not a basket member
    assert!(!snapshot.fiat.contains_key("GBP"));

    let btc = snapshot.crypto_quote("BTC").unwrap();
    assert_eq!(btc.price_usd, 65000.0);
    assert_eq!(btc.market_cap_usd, Some(1.28e12));
}

#[tokio::test]
async fn test_missing_members_are_marked_absent() {
    let server = MockServer::start().await;
    mount_fiat(&server, json!({ "rates": { "USD": 1.0, "EUR": 0.0 } })).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bitcoin": { "usd": 65000.0 },
            "ethereum": {}
        })))
        .mount(&server)
        .await;

    let source = HttpRateSource::new(&sources(&server)).unwrap();
    let snapshot = source.fetch_snapshot(&weights()).await.unwrap();

    match snapshot.completeness() {
        Completeness::Partial { missing_fiat, missing_crypto } => {
            assert_eq!(missing_fiat, vec!["EUR".to_string(), "JPY".to_string()]);
            assert_eq!(missing_crypto, vec!["ETH".to_string()]);
        }
        Completeness::Complete => panic!("expected a partial snapshot"),
    }
    assert_eq!(snapshot.fiat.get("JPY"), Some(&None));
}

#[tokio::test]
async fn test_provider_error_is_upstream_unavailable() {
    let server = MockServer::start().await;
    mount_fiat(&server, json!({ "rates": { "USD": 1.0 } })).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/simple/price"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let source = HttpRateSource::new(&sources(&server)).unwrap();
    let err = source.fetch_snapshot(&weights()).await.unwrap_err();

    assert!(matches!(err, Error::UpstreamUnavailable { ref provider, .. } if provider == "crypto"));
    assert_eq!(err.stage(), "fetch");
}

#[tokio::test]
async fn test_malformed_body_is_upstream_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v6/latest/USD"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/simple/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let source = HttpRateSource::new(&sources(&server)).unwrap();
    let err = source.fetch_snapshot(&weights()).await.unwrap_err();

    assert!(matches!(err, Error::UpstreamUnavailable { ref provider, .. } if provider == "fiat"));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    mount_fiat(&server, json!({ "rates": { "USD": 1.0 } })).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/simple/price"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = SourcesConfig { request_timeout_ms: 200, ..sources(&server) };
    let source = HttpRateSource::new(&config).unwrap();
    let err = source.fetch_snapshot(&weights()).await.unwrap_err();

    assert!(matches!(err, Error::UpstreamUnavailable { ref provider, .. } if provider == "crypto"));
}
