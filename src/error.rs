//! Crate-wide error types and `Result` alias.

// crates.io
use http::StatusCode;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by a caller-supplied refresh function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for the FX rate cache crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),
	#[error(transparent)]
	Yaml(#[from] serde_yaml::Error),

	#[error("Cache backend '{backend}' is unavailable: {reason}")]
	BackendUnavailable { backend: &'static str, reason: String },
	#[error("Upstream HTTP status {status} from {url}: {body:?}")]
	HttpStatus { status: StatusCode, url: url::Url, body: Option<String> },
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("Cache holds no value; it has never been populated.")]
	NotPopulated,
	#[error("Malformed pricing data: {0}")]
	PricingData(String),
	#[error("Unable to find FX rate for {pair}.")]
	RateUnavailable { pair: String },
	#[error("Upstream response of {size} bytes exceeds the {limit} byte guard.")]
	ResponseTooLarge { size: u64, limit: u64 },
	#[error("Cache refresh failed: {0}")]
	RefreshFailed(#[source] BoxError),
	#[error("Either ccy_from {from} or ccy_to {to} is not supported or invalid.")]
	UnsupportedCurrency { from: String, to: String },
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// HTTP status the owning API layer should answer with for this error.
	///
	/// A [`Error::RefreshFailed`] maps through its source when that source is itself a crate
	/// error, so a malformed pricing payload still reads as `404` after crossing the cache.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::UnsupportedCurrency { .. } | Self::Validation { .. } => StatusCode::BAD_REQUEST,
			Self::RateUnavailable { .. } | Self::PricingData(_) => StatusCode::NOT_FOUND,
			Self::HttpStatus { .. }
			| Self::Reqwest(_)
			| Self::ResponseTooLarge { .. }
			| Self::Serde(_) => StatusCode::BAD_GATEWAY,
			Self::BackendUnavailable { .. } | Self::NotPopulated => StatusCode::SERVICE_UNAVAILABLE,
			Self::RefreshFailed(source) => source
				.downcast_ref::<Error>()
				.map(Error::status_code)
				.unwrap_or(StatusCode::BAD_GATEWAY),
			Self::Io(_) | Self::Url(_) | Self::Yaml(_) | Self::Metrics(_) =>
				StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Whether the error originated in the caller-supplied refresh function.
	pub fn is_refresh_failure(&self) -> bool {
		matches!(self, Self::RefreshFailed(_))
	}
}
