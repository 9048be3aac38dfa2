//! Scheduler-level error types shared across dispatch, credentials, and transports.

// crates.io
use oauth2::http::HeaderMap;
// self
use crate::_prelude::*;

/// Scheduler-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;
type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical error delivered to callers awaiting a submitted request.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem or a request that cannot be assembled.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Authorization material could not be produced.
	#[error(transparent)]
	Auth(#[from] AuthError),

	/// The attempt ceiling was reached; carries the last per-attempt failure.
	#[error("Request failed after {attempts} attempt(s): {last}")]
	Exhausted {
		/// Number of dispatches performed for the request.
		attempts: u32,
		/// Failure observed on the final attempt.
		#[source]
		last: AttemptError,
	},
	/// The dispatch task ended without completing the request.
	#[error("Request was abandoned before it completed.")]
	Abandoned,
	/// The scheduler was shut down while the request was still pending.
	#[error("Scheduler has been shut down.")]
	Shutdown,
}

/// Configuration and validation failures raised by the scheduler.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Configuration document could not be decoded.
	#[error("Configuration is invalid at `{path}`.")]
	Parse {
		/// Path of the offending field inside the document.
		path: String,
		/// Underlying decoding failure.
		#[source]
		source: serde_json::Error,
	},

	/// A setting holds a value the scheduler cannot operate with.
	#[error("Setting `{field}` is invalid: {reason}.")]
	InvalidSetting {
		/// Configuration field name.
		field: &'static str,
		/// Human-readable constraint that was violated.
		reason: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Parse { path, source: e.into_inner() }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures produced while acquiring authorization material.
///
/// The type is [`Clone`] because a single refresh outcome is fanned out to every caller
/// waiting on it.
#[derive(Clone, Debug, ThisError)]
pub enum AuthError {
	/// Strategy output could not be interpreted as a credential.
	#[error("Credential is malformed: {reason}.")]
	Malformed {
		/// Description of the offending field or value.
		reason: String,
	},
	/// Strategy output omitted both an absolute and a relative expiry.
	#[error("Credential is missing an expiry.")]
	MissingExpiry,
	/// Relative expiry is negative, zero, or too large to represent.
	#[error("Credential expiry of {seconds} second(s) is out of range.")]
	ExpiryOutOfRange {
		/// Raw relative lifetime reported by the strategy.
		seconds: i64,
	},
	/// Token endpoint refused to issue a credential.
	#[error("Token endpoint rejected the request: {reason}.")]
	Rejected {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Token endpoint could not be reached.
	#[error("Transport failure while fetching a credential.")]
	Transport {
		/// Underlying transport failure.
		#[source]
		source: SharedError,
	},
	/// A caller-supplied credential or header function failed.
	#[error("Authorization callback failed: {source}")]
	Callback {
		/// Failure reported by the callback.
		#[source]
		source: SharedError,
	},
	/// The refresh being waited on was dropped before it settled.
	#[error("Credential refresh was abandoned before it completed.")]
	Abandoned,
}
impl AuthError {
	/// Wraps a failure raised by a custom credential or header callback.
	pub fn callback(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Callback { source: Arc::new(src) }
	}

	pub(crate) fn transport(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Transport { source: Arc::new(src) }
	}
}

/// Failure observed for a single dispatch attempt.
///
/// Attempt failures are handled by the retry policy and only reach callers wrapped in
/// [`Error::Exhausted`].
#[derive(Debug, ThisError)]
pub enum AttemptError {
	/// Origin rejected the credentials (HTTP 401).
	#[error("Origin rejected the authorization (status {}).", .response.status)]
	Unauthorized {
		/// Response returned by the origin.
		response: FailedResponse,
	},
	/// Origin signalled throttling (HTTP 429).
	#[error("Origin is rate limiting requests (status {}).", .response.status)]
	RateLimited {
		/// Retry-After hint, when the origin supplied a parseable one.
		retry_after: Option<StdDuration>,
		/// Response returned by the origin.
		response: FailedResponse,
	},
	/// Origin answered with any other non-success status.
	#[error("Origin returned status {}.", .response.status)]
	Status {
		/// Response returned by the origin.
		response: FailedResponse,
	},
	/// No structured response was available.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Success response body could not be decoded as JSON.
	#[error("Response body with status {status} is not valid JSON.")]
	Decode {
		/// HTTP status of the undecodable response.
		status: u16,
		/// Underlying decoding failure.
		#[source]
		source: serde_json::Error,
	},
}
impl AttemptError {
	/// Returns the HTTP status associated with the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Unauthorized { response }
			| Self::RateLimited { response, .. }
			| Self::Status { response } => Some(response.status),
			Self::Decode { status, .. } => Some(*status),
			Self::Transport(_) => None,
		}
	}
}

/// Structured view of a non-success origin response.
#[derive(Clone, Debug)]
pub struct FailedResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the origin.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the origin.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
