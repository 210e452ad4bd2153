//! Client-level error types shared across requests, refreshes, sessions, and stores.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration or request-construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body did not match the expected JSON shape.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Token pair returned by the backend violated the credential invariants.
	#[error(transparent)]
	Credential(#[from] crate::auth::CredentialError),

	/// No access token was stored when the request was attempted.
	#[error("No access token is stored; sign in first.")]
	NoCredential,
	/// Refreshing the access token failed; stored credentials were cleared.
	#[error("Token refresh failed: {0}")]
	RefreshFailed(#[source] RefreshError),
	/// The endpoint still rejected the request after a refresh-and-retry cycle.
	#[error("Request is still unauthorized after refreshing the token (status {status}).")]
	UnauthorizedAfterRetry {
		/// Status returned by the retried request (401 or 403).
		status: u16,
	},
	/// The backend answered a typed API call with a non-success status.
	#[error("API request failed with status {status}: {message}.")]
	Api {
		/// HTTP status code.
		status: u16,
		/// Backend error code (for example `AUTHORIZATION_FAILED`), when supplied.
		code: Option<String>,
		/// Backend- or client-supplied message.
		message: String,
	},
	/// Login was rejected because of a specific credential field.
	#[error("Login rejected: invalid {field}.")]
	InvalidLogin {
		/// Field the backend flagged.
		field: InvalidField,
	},
	/// Signup was rejected because of a specific form field.
	#[error("Signup rejected: invalid {field}.")]
	InvalidSignup {
		/// Field the backend flagged.
		field: InvalidField,
	},
}
impl Error {
	/// Returns `true` when the failure ended the session and the login redirect fired.
	pub fn is_session_ended(&self) -> bool {
		matches!(
			self,
			Self::NoCredential | Self::RefreshFailed(_) | Self::UnauthorizedAfterRetry { .. }
		)
	}
}

/// Form fields the backend may flag through `detail.invalid`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvalidField {
	/// Unknown or already-taken username.
	Username,
	/// Wrong password.
	Password,
	/// Expired or unknown signup identify token.
	IdentifyToken,
}
impl InvalidField {
	/// Parses the backend's `invalid` marker.
	pub fn from_marker(marker: &str) -> Option<Self> {
		match marker {
			"username" => Some(Self::Username),
			"password" => Some(Self::Password),
			"identify_token" => Some(Self::IdentifyToken),
			_ => None,
		}
	}

	/// Returns the backend marker for this field.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Username => "username",
			Self::Password => "password",
			Self::IdentifyToken => "identify_token",
		}
	}
}
impl Display for InvalidField {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Why a token refresh failed.
///
/// The value is shared with every caller that joined the in-flight refresh, so it only carries
/// owned, cloneable summaries of the underlying failure.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// No refresh token was stored.
	#[error("No refresh token is stored.")]
	MissingRefreshToken,
	/// The refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the request with status {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Backend error code, when supplied.
		code: Option<String>,
	},
	/// The refresh request could not be built.
	#[error("Refresh request could not be built: {message}.")]
	Config {
		/// Summary of the underlying failure.
		message: String,
	},
	/// The refresh request never produced a response.
	#[error("Refresh request failed: {message}.")]
	Transport {
		/// Summary of the underlying failure.
		message: String,
	},
	/// The refresh endpoint returned a body that is not a token pair.
	#[error("Refresh response could not be decoded: {message}.")]
	Decode {
		/// Summary of the underlying failure.
		message: String,
	},
	/// The credential store failed while reading or writing the pair.
	#[error("Credential store failed during refresh: {message}.")]
	Storage {
		/// Summary of the underlying failure.
		message: String,
	},
}

/// Configuration and request-construction failures raised by the client.
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
	HttpRequest(#[from] http::Error),
	/// A request target could not be resolved into an absolute URL.
	#[error("Request target `{target}` cannot be resolved into a URL.")]
	InvalidTarget {
		/// Target path or URL supplied by the caller.
		target: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Resolved URL is not a valid HTTP URI.
	#[error("Resolved URL `{url}` is not a valid request URI.")]
	InvalidUri {
		/// Resolved URL.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: http::uri::InvalidUri,
	},
	/// Stored token material cannot be placed into an HTTP header.
	#[error("Stored credentials cannot be encoded into the {header} header.")]
	InvalidHeaderValue {
		/// Header name.
		header: &'static str,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Serialize(#[source] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Response body did not deserialize into the expected type.
#[derive(Debug, ThisError)]
#[error("Response from `{endpoint}` (status {status}) does not match the expected shape.")]
pub struct DecodeError {
	/// Endpoint path that produced the body.
	pub endpoint: String,
	/// HTTP status code of the response.
	pub status: u16,
	/// Structured parsing failure, including the JSON path that failed.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
}
