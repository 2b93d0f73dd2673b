//! Service configuration loaded from per-environment YAML files.

// std
use std::{
	collections::HashSet,
	env, fs, mem,
	path::{Path, PathBuf},
};
// crates.io
use serde::{Deserialize, Serialize};
use tracing::{Level, level_filters::LevelFilter};
use url::Url;
// self
use crate::{
	_prelude::*,
	cache::{backend::BackendKind, state::RefreshStamp},
};

/// Environment variable selecting the configuration file.
pub const DEPLOY_ENV_VAR: &str = "DEPLOY_ENV";
/// Environment used when [`DEPLOY_ENV_VAR`] is unset.
pub const DEFAULT_DEPLOY_ENV: &str = "dev";
/// Default cache time-to-live.
pub const DEFAULT_REFRESH_TIME: Duration = Duration::from_secs(60 * 60);
/// Default timeout for a single pricing request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Default size guard for pricing responses (1 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 1_048_576;

/// Top-level service settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
	/// Upstream pricing source.
	#[serde(alias = "coinbase")]
	pub pricing: PricingConfig,
	/// Rate cache behaviour.
	#[serde(default)]
	pub cache: CacheConfig,
	/// Logging verbosity.
	#[serde(default)]
	pub log: LogConfig,
}
impl Settings {
	/// Load and validate settings from a YAML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let raw = fs::read_to_string(path).inspect_err(|err| {
			tracing::error!(path = %path.display(), error = %err, "failed to read config file");
		})?;

		Self::from_yaml(&raw)
	}

	/// Load settings for the environment named by `DEPLOY_ENV` (default `dev`) from `config_dir`.
	pub fn from_env(config_dir: impl AsRef<Path>) -> Result<Self> {
		let deploy_env =
			env::var(DEPLOY_ENV_VAR).unwrap_or_else(|_| DEFAULT_DEPLOY_ENV.to_owned());

		Self::load(Self::config_path(config_dir, &deploy_env))
	}

	/// Path of the configuration file for `deploy_env`.
	pub fn config_path(config_dir: impl AsRef<Path>, deploy_env: &str) -> PathBuf {
		config_dir.as_ref().join(format!("{deploy_env}.yaml"))
	}

	/// Parse, normalise and validate settings from YAML text.
	pub fn from_yaml(raw: &str) -> Result<Self> {
		let mut settings: Self = serde_yaml::from_str(raw)?;

		settings.pricing.normalize_currencies();
		settings.validate()?;

		Ok(settings)
	}

	/// Validate the settings against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		self.pricing.validate()
	}
}

/// Upstream pricing source configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PricingConfig {
	/// Endpoint returning the price index.
	pub pricing_url: Url,
	/// Currency codes accepted by the conversion service.
	pub supported_ccy: Vec<String>,
	/// Timeout applied to each pricing request, in seconds.
	#[serde(default = "default_request_timeout", with = "secs")]
	pub request_timeout: Duration,
	/// Maximum accepted response size in bytes.
	#[serde(default = "default_max_response_bytes")]
	pub max_response_bytes: u64,
}
impl PricingConfig {
	/// Construct a configuration with default request limits.
	pub fn new<I, S>(pricing_url: impl AsRef<str>, supported_ccy: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut config = Self {
			pricing_url: Url::parse(pricing_url.as_ref())?,
			supported_ccy: supported_ccy.into_iter().map(Into::into).collect(),
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
		};

		config.normalize_currencies();

		Ok(config)
	}

	/// Whether `ccy` (already upper-cased) is accepted.
	pub fn supports(&self, ccy: &str) -> bool {
		self.supported_ccy.iter().any(|supported| supported == ccy)
	}

	/// Upper-case and de-duplicate currency codes in place, keeping first occurrences.
	pub fn normalize_currencies(&mut self) {
		let currencies = mem::take(&mut self.supported_ccy);
		let mut seen = HashSet::new();

		self.supported_ccy = currencies
			.into_iter()
			.map(|ccy| ccy.trim().to_ascii_uppercase())
			.filter(|ccy| seen.insert(ccy.clone()))
			.collect();
	}

	/// Validate the pricing configuration.
	pub fn validate(&self) -> Result<()> {
		if !matches!(self.pricing_url.scheme(), "http" | "https") {
			return Err(Error::Validation {
				field: "pricing_url",
				reason: "Must use http or https.".into(),
			});
		}
		if self.supported_ccy.is_empty() {
			return Err(Error::Validation {
				field: "supported_ccy",
				reason: "Must list at least one currency.".into(),
			});
		}
		if let Some(ccy) = self
			.supported_ccy
			.iter()
			.find(|ccy| ccy.is_empty() || !ccy.bytes().all(|b| b.is_ascii_alphabetic()))
		{
			return Err(Error::Validation {
				field: "supported_ccy",
				reason: format!("Currency code '{ccy}' must be non-empty ASCII letters."),
			});
		}
		if self.request_timeout.is_zero() {
			return Err(Error::Validation {
				field: "request_timeout",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.max_response_bytes == 0 {
			return Err(Error::Validation {
				field: "max_response_bytes",
				reason: "Must be greater than zero.".into(),
			});
		}

		Ok(())
	}
}

/// Rate cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
	/// Time-to-live of the cached rate table, in seconds.
	#[serde(default = "default_refresh_time", with = "secs")]
	pub refresh_time: Duration,
	/// Where the rate table is stored.
	#[serde(default)]
	pub backend: BackendKind,
	/// When the refresh timestamp is recorded.
	#[serde(default)]
	pub stamp: RefreshStamp,
}
impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			refresh_time: DEFAULT_REFRESH_TIME,
			backend: BackendKind::default(),
			stamp: RefreshStamp::default(),
		}
	}
}

/// Logging configuration handed to the embedding binary's subscriber.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
	/// Maximum verbosity.
	#[serde(default)]
	pub level: LogLevel,
	/// Output format for the subscriber.
	#[serde(default)]
	pub format: LogFormat,
}

/// Log output format accepted in configuration files.
///
/// `json` selects structured output; any other value, including printf-style layout strings
/// carried over from older configuration files, selects the plain text formatter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogFormat {
	/// Human-readable single-line output.
	#[default]
	Plain,
	/// One JSON object per event.
	Json,
}
impl LogFormat {
	/// Whether the subscriber should emit JSON.
	pub fn is_json(self) -> bool {
		self == Self::Json
	}
}
impl From<String> for LogFormat {
	fn from(value: String) -> Self {
		if value.trim().eq_ignore_ascii_case("json") { Self::Json } else { Self::Plain }
	}
}
impl From<LogFormat> for String {
	fn from(value: LogFormat) -> Self {
		match value {
			LogFormat::Plain => "plain",
			LogFormat::Json => "json",
		}
		.into()
	}
}

/// Log verbosity accepted in configuration files.
///
/// Unknown names fall back to [`LogLevel::Info`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
	/// `DEBUG`.
	Debug,
	/// `INFO`.
	#[default]
	Info,
	/// `WARNING`.
	Warning,
	/// `ERROR`.
	Error,
}
impl LogLevel {
	/// Equivalent `tracing` level.
	pub fn as_level(self) -> Level {
		match self {
			Self::Debug => Level::DEBUG,
			Self::Info => Level::INFO,
			Self::Warning => Level::WARN,
			Self::Error => Level::ERROR,
		}
	}

	/// Equivalent filter for subscriber construction.
	pub fn as_filter(self) -> LevelFilter {
		LevelFilter::from_level(self.as_level())
	}
}
impl From<String> for LogLevel {
	fn from(value: String) -> Self {
		match value.trim().to_ascii_uppercase().as_str() {
			"DEBUG" => Self::Debug,
			"WARNING" | "WARN" => Self::Warning,
			"ERROR" => Self::Error,
			_ => Self::Info,
		}
	}
}
impl From<LogLevel> for String {
	fn from(value: LogLevel) -> Self {
		match value {
			LogLevel::Debug => "DEBUG",
			LogLevel::Info => "INFO",
			LogLevel::Warning => "WARNING",
			LogLevel::Error => "ERROR",
		}
		.into()
	}
}

mod secs {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(value.as_secs())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(Duration::from_secs)
	}
}

fn default_refresh_time() -> Duration {
	DEFAULT_REFRESH_TIME
}

fn default_request_timeout() -> Duration {
	DEFAULT_REQUEST_TIMEOUT
}

fn default_max_response_bytes() -> u64 {
	DEFAULT_MAX_RESPONSE_BYTES
}
