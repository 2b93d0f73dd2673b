//! Integration tests for TTL expiry, reset, failure isolation and single-flight refreshes.

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use fx_rate_cache::{CacheState, Error, RefreshStamp, RefreshingCache, Result};

fn increment(value: u64) -> impl FnOnce() -> std::future::Ready<Result<u64>> {
	move || std::future::ready(Ok(value + 1))
}

#[tokio::test(start_paused = true)]
async fn serves_cached_value_until_ttl_elapses() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();
	let cache = RefreshingCache::new("scenario-a", Duration::from_secs(1));

	assert_eq!(cache.get(increment(0)).await?, 1);
	assert_eq!(cache.get(increment(1)).await?, 1, "second call within ttl must hit");

	tokio::time::sleep(Duration::from_millis(1_100)).await;

	assert_eq!(cache.get(increment(2)).await?, 3);
	assert_eq!(cache.get(increment(3)).await?, 3);

	Ok(())
}

#[tokio::test(start_paused = true)]
async fn reset_before_first_get_is_a_no_op() -> Result<()> {
	let cache = RefreshingCache::new("scenario-b", Duration::from_secs(60));

	cache.reset().await;

	assert_eq!(cache.peek().await?, None);
	assert_eq!(cache.snapshot().await.state, CacheState::Empty);
	assert_eq!(cache.get(increment(41)).await?, 42);

	Ok(())
}

#[tokio::test(start_paused = true)]
async fn reset_forces_refresh_within_ttl() -> Result<()> {
	let cache = RefreshingCache::new("reset", Duration::from_secs(3600));

	assert_eq!(cache.get(increment(0)).await?, 1);

	cache.reset().await;

	assert_eq!(cache.get(increment(9)).await?, 10);

	Ok(())
}

#[tokio::test(start_paused = true)]
async fn first_refresh_failure_leaves_cache_empty_and_next_call_retries() -> Result<()> {
	let cache = RefreshingCache::new("scenario-c", Duration::from_secs(60));
	let err = cache.get(|| async { Err::<u64, _>("pricing source unreachable") }).await.unwrap_err();

	assert!(matches!(err, Error::RefreshFailed(ref source) if source.to_string() == "pricing source unreachable"));
	assert_eq!(cache.peek().await?, None);
	assert_eq!(cache.get(increment(6)).await?, 7);

	Ok(())
}

// Compatibility mode diverges from the default: the failed attempt is stamped, so the
// following call inside the TTL neither retries nor finds a value.
#[tokio::test(start_paused = true)]
async fn initiation_stamping_reports_not_populated_after_failed_first_refresh() -> Result<()> {
	let cache = RefreshingCache::new("scenario-c-compat", Duration::from_secs(60))
		.with_stamp(RefreshStamp::OnInitiation);

	assert!(cache.get(|| async { Err::<u64, _>("pricing source unreachable") }).await.is_err());
	assert!(matches!(cache.get(increment(6)).await, Err(Error::NotPopulated)));

	tokio::time::sleep(Duration::from_secs(61)).await;

	assert_eq!(cache.get(increment(6)).await?, 7);

	Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_previous_value_readable() -> Result<()> {
	let cache = RefreshingCache::new("failure-isolation", Duration::from_secs(1));

	assert_eq!(cache.get(increment(0)).await?, 1);

	tokio::time::sleep(Duration::from_secs(2)).await;

	let err = cache.get(|| async { Err::<u64, _>(Error::PricingData("bad quote".into())) }).await;

	assert!(matches!(err, Err(Error::RefreshFailed(_))));
	assert_eq!(cache.peek().await?, Some(1));
	assert_eq!(cache.snapshot().await.metrics.refresh_errors, 1);

	Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_a_single_refresh() -> Result<()> {
	const CALLERS: usize = 32;

	let cache = RefreshingCache::new("single-flight", Duration::from_secs(60));
	let calls = Arc::new(AtomicUsize::new(0));

	for wave in 1..=2 {
		let mut handles = Vec::with_capacity(CALLERS);

		for _ in 0..CALLERS {
			let cache = cache.clone();
			let calls = calls.clone();

			handles.push(tokio::spawn(async move {
				cache
					.get(move || async move {
						let value = calls.fetch_add(1, Ordering::SeqCst) + 1;

						tokio::time::sleep(Duration::from_millis(50)).await;

						Ok::<_, Error>(value)
					})
					.await
			}));
		}

		for handle in handles {
			assert_eq!(handle.await.expect("caller task")?, wave);
		}

		assert_eq!(calls.load(Ordering::SeqCst), wave, "exactly one refresh per expiry window");

		cache.reset().await;
	}

	let metrics = cache.snapshot().await.metrics;

	assert_eq!(metrics.total_requests, (CALLERS * 2) as u64);
	assert_eq!(metrics.refresh_successes, 2);

	Ok(())
}
