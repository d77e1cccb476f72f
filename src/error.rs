//! Relay-level error types shared across the token cache, proxy handlers, and configuration.

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
///
/// Token acquisition failures surface as [`Error::InvalidClient`], [`Error::InvalidGrant`],
/// [`Error::Transient`], [`Error::Transport`], or [`Error::Config`]; failures of the proxied call
/// itself surface as [`Error::Upstream`]. Handlers never expose any of them to the caller.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Unexpected token endpoint response.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout) while calling the token endpoint.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The proxied upstream call failed.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// Listener or server I/O failure.
	#[error("Relay server I/O failure.")]
	Io(#[from] std::io::Error),

	/// Provider rejected the grant.
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or relay-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or relay-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Returns `true` when the failure happened while acquiring the bearer token.
	pub fn is_auth_failure(&self) -> bool {
		matches!(
			self,
			Self::Config(_)
				| Self::Transient(_)
				| Self::Transport(_)
				| Self::InvalidGrant { .. }
				| Self::InvalidClient { .. }
		)
	}
}

/// Configuration and validation failures raised by the relay.
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
	/// Token endpoint URL was rejected by the OAuth client.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an empty access token.
	#[error("Token endpoint returned an empty access token.")]
	EmptyAccessToken,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Unexpected but non-fatal token endpoint responses.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or relay-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The exchange this caller queued behind failed; the failure is shared instead of retried.
	#[error("Concurrent token refresh failed: {message}")]
	SharedRefresh {
		/// Rendered failure of the exchange that was waited on.
		message: String,
	},
}

/// Transport-level failures (network, IO) on the token endpoint.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded the configured timeout.
	#[error("Token endpoint did not answer within the configured timeout.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Failures of the proxied address-validation or form-collection call.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// The request never produced a response (DNS, TCP, TLS, redirect loop).
	#[error("Request to the {endpoint} endpoint failed.")]
	Request {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// Underlying reqwest failure.
		#[source]
		source: ReqwestError,
	},
	/// The request exceeded the configured timeout.
	#[error("The {endpoint} endpoint did not answer within the configured timeout.")]
	Timeout {
		/// Logical endpoint label.
		endpoint: &'static str,
	},
	/// Upstream answered with a non-success status.
	#[error("The {endpoint} endpoint returned HTTP {status}: {body_preview}")]
	Status {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// HTTP status code returned by the upstream.
		status: u16,
		/// Truncated response body, kept for server-side logs only.
		body_preview: String,
	},
	/// Upstream answered with a body that is not JSON.
	#[error("The {endpoint} endpoint returned a body that is not valid JSON.")]
	MalformedBody {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// Parsing failure.
		#[source]
		source: serde_json::Error,
	},
}
impl UpstreamError {
	/// Classifies a reqwest failure raised while calling `endpoint`.
	pub fn from_reqwest(endpoint: &'static str, source: ReqwestError) -> Self {
		if source.is_timeout() { Self::Timeout { endpoint } } else { Self::Request { endpoint, source } }
	}
}

/// Environment-sourced configuration failures raised at startup.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum EnvError {
	/// A required variable is absent or empty.
	#[error("Environment variable `{name}` is required.")]
	Missing {
		/// Variable name.
		name: &'static str,
	},
	/// A variable is present but cannot be interpreted.
	#[error("Environment variable `{name}` is invalid: {reason}.")]
	Invalid {
		/// Variable name.
		name: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("Environment variable `{name}` must be an HTTPS URL: {url}.")]
	InsecureEndpoint {
		/// Variable name.
		name: &'static str,
		/// Rejected URL.
		url: String,
	},
}
