//! Cross-rate table derived from an upstream price index.

// std
use std::collections::BTreeMap;
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Price index document returned by the pricing source.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PriceIndex {
	/// Quotes keyed by currency code.
	#[serde(default)]
	pub bpi: BTreeMap<String, PriceQuote>,
}

/// Quote for one currency against the index asset.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PriceQuote {
	/// Numeric price; absent when the source omits it.
	#[serde(default)]
	pub rate_float: Option<f64>,
}

/// Conversion rates for every ordered pair of quoted currencies.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RateTable {
	rates: BTreeMap<String, f64>,
}
impl RateTable {
	/// Derive cross rates from the index.
	///
	/// Each currency is priced in the same index asset, so `FROM/TO = price(TO) / price(FROM)`.
	/// A quote that is missing, non-finite or zero invalidates the whole table.
	pub fn from_index(index: &PriceIndex) -> Result<Self> {
		let quotes = index
			.bpi
			.iter()
			.map(|(ccy, quote)| match quote.rate_float {
				Some(price) if price.is_finite() && price != 0.0 => Ok((ccy.as_str(), price)),
				other => Err(Error::PricingData(format!(
					"Quote for {ccy} is missing or unusable: {other:?}."
				))),
			})
			.collect::<Result<Vec<_>>>()?;
		let mut rates = BTreeMap::new();

		for (i, &(from, from_price)) in quotes.iter().enumerate() {
			for &(to, to_price) in &quotes[i + 1..] {
				rates.insert(pair_key(from, to), to_price / from_price);
				rates.insert(pair_key(to, from), from_price / to_price);
			}
		}

		Ok(Self { rates })
	}

	/// Rate converting one unit of `from` into `to`.
	pub fn rate(&self, from: &str, to: &str) -> Option<f64> {
		self.rates.get(&pair_key(from, to)).copied()
	}

	/// Number of ordered pairs in the table.
	pub fn len(&self) -> usize {
		self.rates.len()
	}

	/// Whether the table holds no pairs.
	pub fn is_empty(&self) -> bool {
		self.rates.is_empty()
	}

	/// Iterate `(pair, rate)` entries in pair order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
		self.rates.iter().map(|(pair, rate)| (pair.as_str(), *rate))
	}
}

/// Key used for the `from`/`to` pair, e.g. `USD/EUR`.
pub fn pair_key(from: &str, to: &str) -> String {
	format!("{from}/{to}")
}
