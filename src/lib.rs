//! Single-flight TTL refreshing cache for FX rate tables, with pluggable storage backends and a
//! thin currency conversion service built on top of it.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod config;
pub mod metrics;
pub mod pricing;
pub mod service;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use tokio::time::Instant;

	pub use crate::{BoxError, Error, Result};
}

#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
pub use crate::{
	cache::{
		backend::{Backend, BackendKind, MemoryBackend, SharedBackend, Storage},
		manager::{CacheSnapshot, RefreshingCache},
		state::{CacheState, RefreshStamp},
	},
	config::{CacheConfig, LogConfig, LogFormat, LogLevel, PricingConfig, Settings},
	error::{BoxError, Error, Result},
	pricing::{client::PricingClient, rates::RateTable},
	service::{Conversion, ConversionService},
};
