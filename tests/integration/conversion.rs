//! End-to-end conversions against a mocked pricing source.

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use fx_rate_cache::{Conversion, ConversionService, Error, Result, Settings};
use http::StatusCode;
use wiremock::{
	Mock, MockServer, Request, ResponseTemplate,
	matchers::{method, path},
};

const INDEX_PATH: &str = "/v1/bpi/currentprice.json";
const INDEX_BODY: &str = r#"{
	"time": {"updated": "Oct 16, 2026 12:00:00 UTC"},
	"disclaimer": "Test fixture.",
	"bpi": {
		"USD": {"code": "USD", "rate": "50,000.0000", "rate_float": 50000.0},
		"EUR": {"code": "EUR", "rate": "40,000.0000", "rate_float": 40000.0},
		"GBP": {"code": "GBP", "rate": "25,000.0000", "rate_float": 25000.0}
	}
}"#;

fn service_for(server: &MockServer) -> ConversionService {
	service_with_limits(server, "")
}

fn service_with_limits(server: &MockServer, pricing_extra: &str) -> ConversionService {
	let _ = tracing_subscriber::fmt::try_init();
	let settings = Settings::from_yaml(&format!(
		"pricing:\n  pricing_url: {uri}{INDEX_PATH}\n  supported_ccy: [usd, eur, gbp, jpy]\n  request_timeout: 5\n{pricing_extra}cache:\n  refresh_time: 3600\n",
		uri = server.uri()
	))
	.expect("settings");

	ConversionService::from_settings(&settings).expect("conversion service")
}

#[tokio::test]
async fn conversions_share_one_upstream_fetch() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(INDEX_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_string(INDEX_BODY))
		.expect(1)
		.mount(&server)
		.await;

	let service = service_for(&server);

	assert_eq!(
		service.convert("USD", "GBP", 1000.0).await?,
		Conversion { quantity: 500.0, ccy: "GBP".into() }
	);
	assert_eq!(service.convert("gbp", "usd", 3.333).await?.quantity, 6.67);
	assert_eq!(service.convert("EUR", "GBP", 10.0).await?.quantity, 6.25);

	let err = service.convert("USD", "JPY", 1.0).await.unwrap_err();

	assert!(matches!(err, Error::RateUnavailable { ref pair } if pair == "USD/JPY"));
	assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

	let metrics = service.cache().snapshot().await.metrics;

	assert_eq!(metrics.total_requests, 4);
	assert_eq!(metrics.refresh_successes, 1);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn refresh_rates_forces_refetch() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(INDEX_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_string(INDEX_BODY))
		.expect(2)
		.mount(&server)
		.await;

	let service = service_for(&server);

	service.convert("USD", "EUR", 1.0).await?;
	service.refresh_rates().await;
	service.convert("USD", "EUR", 1.0).await?;

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn upstream_outage_surfaces_then_recovers() -> Result<()> {
	let server = MockServer::start().await;
	let calls = Arc::new(AtomicUsize::new(0));
	let responder_calls = calls.clone();

	Mock::given(method("GET"))
		.and(path(INDEX_PATH))
		.respond_with(move |_: &Request| match responder_calls.fetch_add(1, Ordering::SeqCst) {
			0 => ResponseTemplate::new(500).set_body_string("upstream down"),
			_ => ResponseTemplate::new(200).set_body_string(INDEX_BODY),
		})
		.mount(&server)
		.await;

	let service = service_for(&server);
	let err = service.convert("USD", "EUR", 10.0).await.unwrap_err();

	assert!(err.is_refresh_failure());
	assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
	assert_eq!(service.convert("USD", "EUR", 10.0).await?.quantity, 8.0);
	assert_eq!(calls.load(Ordering::SeqCst), 2);

	Ok(())
}

#[tokio::test]
async fn unusable_quote_maps_to_not_found() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(INDEX_PATH))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_string(r#"{"bpi": {"USD": {"rate_float": 50000.0}, "EUR": {"code": "EUR"}}}"#),
		)
		.mount(&server)
		.await;

	let err = service_for(&server).convert("USD", "EUR", 1.0).await.unwrap_err();

	assert!(err.is_refresh_failure());
	assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_upstream_response_is_a_bad_gateway() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(INDEX_PATH))
		.respond_with(ResponseTemplate::new(200).set_body_string(INDEX_BODY))
		.expect(1)
		.mount(&server)
		.await;

	let service = service_with_limits(&server, "  max_response_bytes: 16\n");
	let err = service.convert("USD", "EUR", 1.0).await.unwrap_err();

	assert!(err.is_refresh_failure());
	assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
	assert_eq!(service.cache().peek().await.expect("memory backend"), None);

	server.verify().await;
}
