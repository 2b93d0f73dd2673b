//! Storage strategies holding the cached value.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;
// self
use crate::_prelude::*;

/// Capability set every storage strategy provides to the cache.
///
/// Reads happen outside the cache's single-flight lock, so implementations must tolerate a read
/// racing a concurrent write and return either the old or the new value in full.
pub trait Backend<V>: Send + Sync {
	/// Short identifier used in logs and errors.
	fn name(&self) -> &'static str;

	/// Load the stored value, if any.
	fn read(&self) -> impl Future<Output = Result<Option<V>>> + Send;

	/// Replace the stored value.
	fn write(&self, value: V) -> impl Future<Output = Result<()>> + Send;
}

/// Storage selection as it appears in configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendKind {
	/// Process-local slot.
	#[default]
	Memory,
	/// Store shared by every instance running the same cache key.
	Shared {
		/// Address of the external store.
		endpoint: Url,
		/// Key the cached value lives under.
		key: String,
	},
}

/// Single in-memory slot visible only within this process.
pub struct MemoryBackend<V> {
	slot: RwLock<Option<V>>,
}
impl<V> MemoryBackend<V> {
	/// Create an empty slot.
	pub fn new() -> Self {
		Self { slot: RwLock::new(None) }
	}
}
impl<V> Default for MemoryBackend<V> {
	fn default() -> Self {
		Self::new()
	}
}
impl<V> Debug for MemoryBackend<V> {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("MemoryBackend").finish_non_exhaustive()
	}
}
impl<V> Backend<V> for MemoryBackend<V>
where
	V: Clone + Send + Sync,
{
	fn name(&self) -> &'static str {
		"memory"
	}

	async fn read(&self) -> Result<Option<V>> {
		let value = self.slot.read().await.clone();

		tracing::trace!(populated = value.is_some(), "memory backend read");

		Ok(value)
	}

	async fn write(&self, value: V) -> Result<()> {
		*self.slot.write().await = Some(value);

		tracing::trace!("memory backend write");

		Ok(())
	}
}

/// Backend addressing a store shared across service instances.
///
/// Only the addressing contract exists so far: reads and writes go to a process-local slot, so
/// instances do NOT observe each other's refreshes. A real store must report connectivity
/// problems as [`Error::BackendUnavailable`] and provide its own atomic read-modify-write.
pub struct SharedBackend<V> {
	endpoint: Url,
	key: String,
	local: MemoryBackend<V>,
}
impl<V> SharedBackend<V> {
	/// Address the shared store at `endpoint` under `key`.
	pub fn new(endpoint: Url, key: impl Into<String>) -> Self {
		let key = key.into();

		tracing::warn!(
			endpoint = %endpoint,
			key = %key,
			"shared cache backend is not wired to an external store; values stay process-local"
		);

		Self { endpoint, key, local: MemoryBackend::new() }
	}

	/// Address of the external store.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Key the cached value lives under.
	pub fn key(&self) -> &str {
		&self.key
	}
}
impl<V> Debug for SharedBackend<V> {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("SharedBackend")
			.field("endpoint", &self.endpoint.as_str())
			.field("key", &self.key)
			.finish_non_exhaustive()
	}
}
impl<V> Backend<V> for SharedBackend<V>
where
	V: Clone + Send + Sync,
{
	fn name(&self) -> &'static str {
		"shared"
	}

	async fn read(&self) -> Result<Option<V>> {
		tracing::debug!(key = %self.key, "shared backend read");

		self.local.read().await
	}

	async fn write(&self, value: V) -> Result<()> {
		tracing::debug!(key = %self.key, "shared backend write");

		self.local.write(value).await
	}
}

/// Backend chosen at construction from a [`BackendKind`].
#[derive(Debug)]
pub enum Storage<V> {
	/// See [`MemoryBackend`].
	Memory(MemoryBackend<V>),
	/// See [`SharedBackend`].
	Shared(SharedBackend<V>),
}
impl<V> Storage<V> {
	/// Build the backend described by `kind`.
	pub fn from_kind(kind: &BackendKind) -> Self {
		match kind {
			BackendKind::Memory => Self::Memory(MemoryBackend::new()),
			BackendKind::Shared { endpoint, key } =>
				Self::Shared(SharedBackend::new(endpoint.clone(), key.clone())),
		}
	}
}
impl<V> Backend<V> for Storage<V>
where
	V: Clone + Send + Sync,
{
	fn name(&self) -> &'static str {
		match self {
			Self::Memory(backend) => backend.name(),
			Self::Shared(backend) => backend.name(),
		}
	}

	async fn read(&self) -> Result<Option<V>> {
		match self {
			Self::Memory(backend) => backend.read().await,
			Self::Shared(backend) => backend.read().await,
		}
	}

	async fn write(&self, value: V) -> Result<()> {
		match self {
			Self::Memory(backend) => backend.write(value).await,
			Self::Shared(backend) => backend.write(value).await,
		}
	}
}
