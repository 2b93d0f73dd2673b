//! Metrics helpers and per-cache telemetry bookkeeping.
//!
//! Counters are always tracked in [`CacheMetrics`]; the `metrics` feature additionally forwards
//! them to the global `metrics` facade labelled by cache name.

// std
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
// crates.io
#[cfg(feature = "metrics")] use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
#[cfg(feature = "metrics")] use smallvec::SmallVec;
// self
use crate::_prelude::*;

#[cfg(feature = "metrics")]
type LabelSet = SmallVec<[Label; 2]>;

#[cfg(feature = "metrics")]
const METRIC_REQUESTS_TOTAL: &str = "fx_cache_requests_total";
#[cfg(feature = "metrics")]
const METRIC_HITS_TOTAL: &str = "fx_cache_hits_total";
#[cfg(feature = "metrics")]
const METRIC_MISSES_TOTAL: &str = "fx_cache_misses_total";
#[cfg(feature = "metrics")]
const METRIC_REFRESH_TOTAL: &str = "fx_cache_refresh_total";
#[cfg(feature = "metrics")]
const METRIC_REFRESH_DURATION: &str = "fx_cache_refresh_duration_seconds";
#[cfg(feature = "metrics")]
const METRIC_REFRESH_ERRORS: &str = "fx_cache_refresh_errors_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe metrics accumulator for a single cache.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	total_requests: AtomicU64,
	cache_hits: AtomicU64,
	refresh_successes: AtomicU64,
	refresh_errors: AtomicU64,
	// Latency plus one; zero means no refresh completed yet.
	last_refresh_micros: AtomicU64,
}
impl CacheMetrics {
	/// Create a new metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a lookup answered without refreshing.
	pub fn record_hit(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a lookup that had to refresh.
	pub fn record_miss(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a successful refresh and latency.
	pub fn record_refresh_success(&self, duration: Duration) {
		let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX - 1);

		self.refresh_successes.fetch_add(1, Ordering::Relaxed);
		self.last_refresh_micros.store(micros + 1, Ordering::Relaxed);
	}

	/// Record refresh failure.
	pub fn record_refresh_error(&self) {
		self.refresh_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> CacheMetricsSnapshot {
		CacheMetricsSnapshot {
			total_requests: self.total_requests.load(Ordering::Relaxed),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			refresh_successes: self.refresh_successes.load(Ordering::Relaxed),
			refresh_errors: self.refresh_errors.load(Ordering::Relaxed),
			last_refresh_micros: self.last_refresh_micros.load(Ordering::Relaxed).checked_sub(1),
		}
	}
}

/// Read-only snapshot of per-cache telemetry counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheMetricsSnapshot {
	/// Total number of `get` calls observed.
	pub total_requests: u64,
	/// Count of `get` calls served without refreshing.
	pub cache_hits: u64,
	/// Count of successful refresh operations.
	pub refresh_successes: u64,
	/// Count of refresh attempts that resulted in errors.
	pub refresh_errors: u64,
	/// Microsecond latency of the most recent refresh.
	pub last_refresh_micros: Option<u64>,
}
impl CacheMetricsSnapshot {
	/// Count of `get` calls that had to refresh.
	pub fn cache_misses(&self) -> u64 {
		self.total_requests.saturating_sub(self.cache_hits)
	}

	/// Convenience method to compute the cache hit rate.
	pub fn hit_rate(&self) -> f64 {
		if self.total_requests == 0 {
			0.0
		} else {
			self.cache_hits as f64 / self.total_requests as f64
		}
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record a lookup served from the stored value.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn record_hit(cache: &str) {
	#[cfg(feature = "metrics")]
	{
		let labels = base_labels(cache);

		metrics::counter!(METRIC_REQUESTS_TOTAL, labels.iter()).increment(1);
		metrics::counter!(METRIC_HITS_TOTAL, labels.iter()).increment(1);
	}
}

/// Record a lookup that triggered a refresh.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn record_miss(cache: &str) {
	#[cfg(feature = "metrics")]
	{
		let labels = base_labels(cache);

		metrics::counter!(METRIC_REQUESTS_TOTAL, labels.iter()).increment(1);
		metrics::counter!(METRIC_MISSES_TOTAL, labels.iter()).increment(1);
	}
}

/// Record a successful refresh along with its latency.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn record_refresh_success(cache: &str, duration: Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(METRIC_REFRESH_TOTAL, status_labels(cache, "success").iter())
			.increment(1);
		metrics::histogram!(METRIC_REFRESH_DURATION, base_labels(cache).iter())
			.record(duration.as_secs_f64());
	}
}

/// Record a failed refresh.
#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
pub fn record_refresh_error(cache: &str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(METRIC_REFRESH_TOTAL, status_labels(cache, "error").iter()).increment(1);
		metrics::counter!(METRIC_REFRESH_ERRORS, base_labels(cache).iter()).increment(1);
	}
}

#[cfg(feature = "metrics")]
fn base_labels(cache: &str) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("cache", cache.to_owned()));

	labels
}

#[cfg(feature = "metrics")]
fn status_labels(cache: &str, status: &'static str) -> LabelSet {
	let mut labels = base_labels(cache);

	labels.push(Label::new("status", status));

	labels
}
