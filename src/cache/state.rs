//! Refresh bookkeeping deciding when the cached value is due for a refresh.

// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// When the refresh timestamp is recorded relative to the refresh function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStamp {
	/// Stamp only once the refreshed value has been stored.
	///
	/// A failed refresh leaves the cache due, so the next `get` retries immediately.
	#[default]
	OnSuccess,
	/// Stamp as soon as a refresh is initiated, before the refresh function runs.
	///
	/// A failed refresh is then not retried until the TTL elapses again or the cache is reset;
	/// kept for deployments relying on that throttling.
	OnInitiation,
}

/// Coarse lifecycle state reported in cache snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CacheState {
	/// No refresh has been stamped yet, or the cache was reset.
	Empty,
	/// The last stamp is within the TTL window.
	Fresh,
	/// The TTL window elapsed; the next `get` refreshes.
	Expired,
}

/// Refresh timestamps and failure bookkeeping guarded by the cache.
#[derive(Clone, Debug)]
pub struct RefreshClock {
	ttl: Duration,
	last_refresh_at: Option<Instant>,
	last_refresh_wallclock: Option<DateTime<Utc>>,
	generation: u64,
	consecutive_failures: u32,
}
impl RefreshClock {
	/// Create a clock that has never been stamped.
	pub fn new(ttl: Duration) -> Self {
		Self {
			ttl,
			last_refresh_at: None,
			last_refresh_wallclock: None,
			generation: 0,
			consecutive_failures: 0,
		}
	}

	/// Configured time-to-live.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Monotonic instant of the last stamp.
	pub fn last_refresh_at(&self) -> Option<Instant> {
		self.last_refresh_at
	}

	/// Wall-clock time of the last stamp.
	pub fn last_refresh_wallclock(&self) -> Option<DateTime<Utc>> {
		self.last_refresh_wallclock
	}

	/// Number of resets observed; refreshes started before a reset must not re-stamp.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Failed refreshes since the last successful one.
	pub fn consecutive_failures(&self) -> u32 {
		self.consecutive_failures
	}

	/// Whether a refresh is due at `now`.
	///
	/// The TTL bound is exclusive: a value stamped exactly `ttl` ago is still served.
	pub fn is_due(&self, now: Instant) -> bool {
		match self.last_refresh_at {
			None => true,
			Some(at) => now.saturating_duration_since(at) > self.ttl,
		}
	}

	/// Monotonic instant after which the next refresh becomes due.
	pub fn next_refresh_at(&self) -> Option<Instant> {
		self.last_refresh_at.map(|at| at + self.ttl)
	}

	/// Record a refresh stamp.
	pub fn stamp(&mut self, now: Instant) {
		self.last_refresh_at = Some(now);
		self.last_refresh_wallclock = Some(Utc::now());
	}

	/// Record a successful refresh that started at `started_at`.
	///
	/// Returns `false` without stamping when the cache was reset while the refresh ran.
	pub fn record_success(&mut self, generation: u64, started_at: Instant) -> bool {
		self.reset_failures();

		if generation != self.generation {
			return false;
		}

		self.stamp(started_at);

		true
	}

	/// Clear the failure streak without touching the stamp.
	pub fn reset_failures(&mut self) {
		self.consecutive_failures = 0;
	}

	/// Record a failed refresh.
	pub fn record_failure(&mut self) {
		self.consecutive_failures = self.consecutive_failures.saturating_add(1);
	}

	/// Forget the last stamp so the next `get` refreshes unconditionally.
	pub fn clear(&mut self) {
		self.last_refresh_at = None;
		self.last_refresh_wallclock = None;
		self.generation = self.generation.wrapping_add(1);
	}

	/// Lifecycle state at `now`.
	pub fn state(&self, now: Instant) -> CacheState {
		match self.last_refresh_at {
			None => CacheState::Empty,
			Some(_) if self.is_due(now) => CacheState::Expired,
			Some(_) => CacheState::Fresh,
		}
	}
}
