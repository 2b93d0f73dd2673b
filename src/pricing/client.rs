//! HTTP client integration for price index retrieval.

// crates.io
use http::header::ACCEPT;
use reqwest::Client;
// self
use crate::{
	_prelude::*,
	config::PricingConfig,
	pricing::rates::{PriceIndex, RateTable},
};

/// Fetches the price index and turns it into a [`RateTable`].
///
/// Every request is bounded by the configured timeout; the cache calling this client imposes
/// none of its own.
#[derive(Clone, Debug)]
pub struct PricingClient {
	client: Client,
	config: Arc<PricingConfig>,
}
impl PricingClient {
	/// Build a client with a dedicated reqwest client honouring the configured timeout.
	pub fn new(config: PricingConfig) -> Result<Self> {
		config.validate()?;

		let client = Client::builder()
			.user_agent(format!("fx-rate-cache/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(Duration::from_secs(5))
			.timeout(config.request_timeout)
			.build()?;

		Ok(Self::with_client(config, client))
	}

	/// Build a client using the supplied HTTP client (primarily for tests).
	pub fn with_client(config: PricingConfig, client: Client) -> Self {
		Self { client, config: Arc::new(config) }
	}

	/// Pricing configuration in use.
	pub fn config(&self) -> &PricingConfig {
		&self.config
	}

	/// Request the price index and derive the rate table.
	#[tracing::instrument(skip(self), fields(url = %self.config.pricing_url))]
	pub async fn fetch_rates(&self) -> Result<RateTable> {
		tracing::info!("requesting pricing data");

		let url = self.config.pricing_url.clone();
		let start = Instant::now();
		let response = self.client.get(url.clone()).header(ACCEPT, "application/json").send().await?;
		let status = response.status();

		if !status.is_success() {
			let body = response.text().await.ok();

			tracing::error!(%status, "pricing source returned an error status");

			return Err(Error::HttpStatus { status, url, body });
		}

		let bytes = response.bytes().await?;
		let size = bytes.len() as u64;

		if size > self.config.max_response_bytes {
			tracing::error!(
				size,
				limit = self.config.max_response_bytes,
				"pricing response exceeds the size guard"
			);

			return Err(Error::ResponseTooLarge { size, limit: self.config.max_response_bytes });
		}

		let index: PriceIndex = serde_json::from_slice(&bytes)?;
		let table = RateTable::from_index(&index).inspect_err(|err| {
			tracing::error!(error = %err, "pricing data could not be turned into rates");
		})?;

		tracing::debug!(
			status = %status,
			elapsed = ?start.elapsed(),
			pairs = table.len(),
			"pricing fetch complete"
		);

		Ok(table)
	}
}
