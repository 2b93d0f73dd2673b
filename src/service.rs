//! Currency conversion backed by the cached rate table.

// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	cache::{backend::Storage, manager::RefreshingCache},
	config::Settings,
	pricing::{
		client::PricingClient,
		rates::{RateTable, pair_key},
	},
};

/// Name of the rate cache in logs and metric labels.
pub const RATES_CACHE_NAME: &str = "fx-rates";

/// Cache type holding the shared rate table.
pub type RatesCache = RefreshingCache<Arc<RateTable>, Storage<Arc<RateTable>>>;

/// Result of a conversion, shaped like the API response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
	/// Converted quantity, rounded to two decimals unless no conversion took place.
	pub quantity: f64,
	/// Target currency code.
	pub ccy: String,
}

/// Conversion service owning the rate cache and the pricing client.
///
/// Construct one per process at start-up and hand clones to request handlers; clones share the
/// cache.
#[derive(Clone, Debug)]
pub struct ConversionService {
	cache: RatesCache,
	client: PricingClient,
}
impl ConversionService {
	/// Assemble a service from its parts.
	pub fn new(client: PricingClient, cache: RatesCache) -> Self {
		Self { cache, client }
	}

	/// Build the pricing client and rate cache described by `settings`.
	pub fn from_settings(settings: &Settings) -> Result<Self> {
		let client = PricingClient::new(settings.pricing.clone())?;
		let cache = RefreshingCache::from_config(RATES_CACHE_NAME, &settings.cache);

		tracing::info!(
			ttl = ?settings.cache.refresh_time,
			backend = ?settings.cache.backend,
			stamp = ?settings.cache.stamp,
			"conversion service configured"
		);

		Ok(Self::new(client, cache))
	}

	/// Rate cache backing the service.
	pub fn cache(&self) -> &RatesCache {
		&self.cache
	}

	/// Convert `quantity` units of `ccy_from` into `ccy_to`.
	///
	/// Currency codes are case-insensitive. Converting a currency into itself returns the quantity
	/// untouched without consulting the rate table.
	#[tracing::instrument(skip(self))]
	pub async fn convert(&self, ccy_from: &str, ccy_to: &str, quantity: f64) -> Result<Conversion> {
		let from = ccy_from.trim().to_ascii_uppercase();
		let to = ccy_to.trim().to_ascii_uppercase();

		if !quantity.is_finite() {
			return Err(Error::Validation {
				field: "quantity",
				reason: "Must be a finite number.".into(),
			});
		}

		let pricing = self.client.config();

		if !pricing.supports(&from) || !pricing.supports(&to) {
			tracing::error!(%from, %to, "unsupported currency requested");

			return Err(Error::UnsupportedCurrency { from, to });
		}
		if from == to {
			return Ok(Conversion { quantity, ccy: to });
		}

		let rates = self.rates().await?;
		let Some(rate) = rates.rate(&from, &to) else {
			let pair = pair_key(&from, &to);

			tracing::error!(%pair, "no rate available for pair");

			return Err(Error::RateUnavailable { pair });
		};

		Ok(Conversion { quantity: round_cents(quantity * rate), ccy: to })
	}

	/// Current rate table, refreshed from the pricing source when the cache expired.
	pub async fn rates(&self) -> Result<Arc<RateTable>> {
		let client = &self.client;

		self.cache.get(move || async move { client.fetch_rates().await.map(Arc::new) }).await
	}

	/// Force the next conversion to refetch rates.
	pub async fn refresh_rates(&self) {
		self.cache.reset().await;
	}
}

fn round_cents(value: f64) -> f64 {
	(value * 100.0).round() / 100.0
}
