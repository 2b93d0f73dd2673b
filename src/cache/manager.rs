//! Single-flight refreshing cache guarding one value.

// std
use std::marker::PhantomData;
// crates.io
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
// self
use crate::{
	_prelude::*,
	cache::{
		backend::{Backend, MemoryBackend, Storage},
		state::{CacheState, RefreshClock, RefreshStamp},
	},
	config::CacheConfig,
	metrics::{self, CacheMetrics, CacheMetricsSnapshot},
};

/// TTL cache holding a single value produced by a caller-supplied refresh function.
///
/// Concurrent `get` calls are serialised through one single-flight lock while the expiry check,
/// the refresh function and the backend write run; the final read of the stored value happens
/// after that lock is released. A caller racing a later refresh may therefore observe the newer
/// value instead of the one its own call computed.
///
/// Clones share the same state.
pub struct RefreshingCache<V, B = MemoryBackend<V>> {
	name: Arc<str>,
	stamp: RefreshStamp,
	backend: Arc<B>,
	clock: Arc<RwLock<RefreshClock>>,
	single_flight: Arc<Mutex<()>>,
	metrics: Arc<CacheMetrics>,
	_value: PhantomData<fn() -> V>,
}
impl<V> RefreshingCache<V, MemoryBackend<V>>
where
	V: Clone + Send + Sync,
{
	/// Build a process-local cache.
	pub fn new(name: impl Into<Arc<str>>, ttl: Duration) -> Self {
		Self::with_backend(name, ttl, MemoryBackend::new())
	}
}
impl<V> RefreshingCache<V, Storage<V>>
where
	V: Clone + Send + Sync,
{
	/// Build a cache whose TTL, backend and stamping policy come from configuration.
	pub fn from_config(name: impl Into<Arc<str>>, config: &CacheConfig) -> Self {
		Self::with_backend(name, config.refresh_time, Storage::from_kind(&config.backend))
			.with_stamp(config.stamp)
	}
}
impl<V, B> RefreshingCache<V, B>
where
	V: Clone + Send + Sync,
	B: Backend<V>,
{
	/// Build a cache over the supplied backend.
	pub fn with_backend(name: impl Into<Arc<str>>, ttl: Duration, backend: B) -> Self {
		Self {
			name: name.into(),
			stamp: RefreshStamp::default(),
			backend: Arc::new(backend),
			clock: Arc::new(RwLock::new(RefreshClock::new(ttl))),
			single_flight: Arc::new(Mutex::new(())),
			metrics: CacheMetrics::new(),
			_value: PhantomData,
		}
	}

	/// Select when the refresh timestamp is recorded.
	pub fn with_stamp(mut self, stamp: RefreshStamp) -> Self {
		self.stamp = stamp;

		self
	}

	/// Cache name used in logs and metric labels.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Stamping policy in effect.
	pub fn stamp(&self) -> RefreshStamp {
		self.stamp
	}

	/// Storage backend holding the value.
	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Access the per-cache metrics accumulator.
	pub fn metrics(&self) -> Arc<CacheMetrics> {
		self.metrics.clone()
	}

	/// Return the stored value, invoking `refresh` first when the TTL elapsed or the cache was
	/// never populated.
	///
	/// A `refresh` error is returned as [`Error::RefreshFailed`] with the caller's error as its
	/// source; the stored value is left untouched. With [`RefreshStamp::OnInitiation`] the failed
	/// attempt still counts as a refresh, so the next call within the TTL does not retry unless
	/// [`reset`](Self::reset) is called, and returns [`Error::NotPopulated`] if nothing was ever
	/// stored.
	#[tracing::instrument(skip_all, fields(cache = %self.name, backend = self.backend.name()))]
	pub async fn get<F, Fut, E>(&self, refresh: F) -> Result<V>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = std::result::Result<V, E>>,
		E: Into<BoxError>,
	{
		self.refresh_if_due(refresh).await?;

		self.backend.read().await?.ok_or(Error::NotPopulated)
	}

	/// Mark the cache expired so the next `get` refreshes regardless of elapsed time.
	///
	/// The stored value is kept. A refresh already in flight will not re-stamp the cache.
	pub async fn reset(&self) {
		self.clock.write().await.clear();

		tracing::debug!(cache = %self.name, "cache reset; next get refreshes");
	}

	/// Read the stored value without refreshing.
	pub async fn peek(&self) -> Result<Option<V>> {
		self.backend.read().await
	}

	/// Capture the current cache state for status reporting.
	pub async fn snapshot(&self) -> CacheSnapshot {
		let now = Instant::now();
		let clock = { self.clock.read().await.clone() };
		let next_refresh = clock.last_refresh_wallclock().and_then(|last| {
			let ttl = TimeDelta::from_std(clock.ttl()).ok()?;

			last.checked_add_signed(ttl)
		});

		CacheSnapshot {
			name: self.name.to_string(),
			backend: self.backend.name(),
			state: clock.state(now),
			ttl: clock.ttl(),
			last_refresh: clock.last_refresh_wallclock(),
			next_refresh,
			consecutive_failures: clock.consecutive_failures(),
			metrics: self.metrics.snapshot(),
		}
	}

	async fn refresh_if_due<F, Fut, E>(&self, refresh: F) -> Result<()>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = std::result::Result<V, E>>,
		E: Into<BoxError>,
	{
		let _guard = self.single_flight.lock().await;
		let started_at = Instant::now();
		let generation = {
			let mut clock = self.clock.write().await;

			if !clock.is_due(started_at) {
				tracing::debug!("refresh not due; serving stored value");

				self.observe_hit();

				return Ok(());
			}
			if self.stamp == RefreshStamp::OnInitiation {
				clock.stamp(started_at);
			}

			clock.generation()
		};

		tracing::debug!(stamp = ?self.stamp, "refresh due; invoking refresh function");

		self.observe_miss();

		let value = match refresh().await {
			Ok(value) => value,
			Err(err) => {
				let err = err.into();

				tracing::warn!(error = %err, "refresh failed; stored value left untouched");

				self.clock.write().await.record_failure();
				self.observe_refresh_error();

				return Err(Error::RefreshFailed(err));
			},
		};

		if let Err(err) = self.backend.write(value).await {
			tracing::warn!(error = %err, "refreshed value could not be stored");

			self.clock.write().await.record_failure();
			self.observe_refresh_error();

			return Err(err);
		}

		self.observe_refresh_success(started_at.elapsed());

		let mut clock = self.clock.write().await;

		match self.stamp {
			RefreshStamp::OnSuccess =>
				if !clock.record_success(generation, started_at) {
					tracing::debug!("cache reset during refresh; leaving it due");
				},
			RefreshStamp::OnInitiation => clock.reset_failures(),
		}

		Ok(())
	}

	fn observe_hit(&self) {
		metrics::record_hit(&self.name);

		self.metrics.record_hit();
	}

	fn observe_miss(&self) {
		metrics::record_miss(&self.name);

		self.metrics.record_miss();
	}

	fn observe_refresh_success(&self, duration: Duration) {
		metrics::record_refresh_success(&self.name, duration);

		self.metrics.record_refresh_success(duration);
	}

	fn observe_refresh_error(&self) {
		metrics::record_refresh_error(&self.name);

		self.metrics.record_refresh_error();
	}
}
impl<V, B> Clone for RefreshingCache<V, B> {
	fn clone(&self) -> Self {
		Self {
			name: self.name.clone(),
			stamp: self.stamp,
			backend: self.backend.clone(),
			clock: self.clock.clone(),
			single_flight: self.single_flight.clone(),
			metrics: self.metrics.clone(),
			_value: PhantomData,
		}
	}
}
impl<V, B> std::fmt::Debug for RefreshingCache<V, B>
where
	B: std::fmt::Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RefreshingCache")
			.field("name", &self.name)
			.field("stamp", &self.stamp)
			.field("backend", &self.backend)
			.finish_non_exhaustive()
	}
}

/// Snapshot of cache state captured for status reporting.
#[derive(Clone, Debug, Serialize)]
pub struct CacheSnapshot {
	/// Cache name.
	pub name: String,
	/// Backend identifier.
	pub backend: &'static str,
	/// Lifecycle state at capture time.
	pub state: CacheState,
	/// Configured time-to-live.
	pub ttl: Duration,
	/// Wall-clock time of the last refresh stamp.
	pub last_refresh: Option<DateTime<Utc>>,
	/// Wall-clock time after which the next `get` refreshes.
	pub next_refresh: Option<DateTime<Utc>>,
	/// Failed refreshes since the last success.
	pub consecutive_failures: u32,
	/// Counters accumulated by the cache.
	pub metrics: CacheMetricsSnapshot,
}
