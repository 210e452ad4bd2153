//! Client configuration: API base URL, auth endpoint paths, and login entry point.
//!
//! [`ClientConfigBuilder`] is also `Deserialize`, so a JSON document with any subset of its
//! fields can be validated into a [`ClientConfig`] through [`ClientConfig::from_json`].

// self
use crate::{_prelude::*, auth::DEFAULT_TOKEN_TYPE, error::ConfigError};

/// Errors raised while constructing or validating a [`ClientConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ClientConfigError {
	/// No base URL was supplied.
	#[error("Missing base URL.")]
	MissingBaseUrl,
	/// Base URL must be an absolute `http`/`https` URL.
	#[error("The base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Offending URL.
		url: String,
	},
	/// HTTPS was required but the base URL is plain HTTP.
	#[error("The base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Endpoint paths must be absolute (`/auth/login`) and contain no whitespace.
	#[error("The {endpoint} path `{path}` must start with `/` and contain no whitespace.")]
	InvalidPath {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Offending path.
		path: String,
	},
	/// Token type must be a single non-empty word.
	#[error("Default token type `{token_type}` must be a single non-empty word.")]
	InvalidTokenType {
		/// Offending token type.
		token_type: String,
	},
	/// JSON configuration could not be parsed.
	#[error("Configuration JSON is invalid: {message}.")]
	Parse {
		/// Parser message including the failing path.
		message: String,
	},
}

/// Auth endpoint paths relative to the base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEndpoints {
	/// Credential exchange endpoint.
	pub login: String,
	/// Account creation endpoint.
	pub signup: String,
	/// Token refresh endpoint.
	pub refresh: String,
}
impl Default for AuthEndpoints {
	fn default() -> Self {
		Self {
			login: "/auth/login".into(),
			signup: "/auth/signup".into(),
			refresh: "/auth/refresh".into(),
		}
	}
}

/// Immutable, validated client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// API origin plus optional path prefix (for example `https://school.example/api`).
	pub base_url: Url,
	/// Auth endpoint paths.
	pub endpoints: AuthEndpoints,
	/// Location handed to the redirect hook when the session ends.
	pub login_entry_point: String,
	/// Authorization scheme used when the stored pair carries none.
	pub default_token_type: String,
}
impl ClientConfig {
	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Parses a JSON document into a builder and validates it.
	pub fn from_json(raw: &str) -> Result<Self, ClientConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let builder: ClientConfigBuilder = serde_path_to_error::deserialize(&mut de)
			.map_err(|e| ClientConfigError::Parse { message: e.to_string() })?;

		builder.build()
	}

	/// Resolves a request target against the base URL.
	///
	/// Absolute `http(s)://` targets are returned unchanged. Anything else is appended to the
	/// base URL's path, so `/timetable` under `https://host/api` becomes
	/// `https://host/api/timetable`.
	pub fn resolve(&self, target: &str) -> Result<Url, ConfigError> {
		let parse = |raw: &str| {
			Url::parse(raw)
				.map_err(|source| ConfigError::InvalidTarget { target: target.to_owned(), source })
		};

		if target.starts_with("http://") || target.starts_with("https://") {
			return parse(target);
		}

		let base = self.base_url.as_str().trim_end_matches('/');
		let path = target.trim_start_matches('/');

		parse(&format!("{base}/{path}"))
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigBuilder {
	/// API origin plus optional path prefix.
	pub base_url: Option<Url>,
	/// Auth endpoint paths.
	pub endpoints: AuthEndpoints,
	/// Location handed to the redirect hook when the session ends.
	pub login_entry_point: String,
	/// Authorization scheme used when the stored pair carries none.
	pub default_token_type: String,
	/// Rejects plain-HTTP base URLs when set.
	pub require_https: bool,
}
impl Default for ClientConfigBuilder {
	fn default() -> Self {
		Self {
			base_url: None,
			endpoints: AuthEndpoints::default(),
			login_entry_point: "/login".into(),
			default_token_type: DEFAULT_TOKEN_TYPE.into(),
			require_https: false,
		}
	}
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with the provided base URL.
	pub fn new(base_url: Url) -> Self {
		Self { base_url: Some(base_url), ..Default::default() }
	}

	/// Overrides the login endpoint path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.login = path.into();

		self
	}

	/// Overrides the signup endpoint path.
	pub fn signup_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.signup = path.into();

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Overrides the login entry point handed to the redirect hook.
	pub fn login_entry_point(mut self, location: impl Into<String>) -> Self {
		self.login_entry_point = location.into();

		self
	}

	/// Overrides the fallback authorization scheme.
	pub fn default_token_type(mut self, token_type: impl Into<String>) -> Self {
		self.default_token_type = token_type.into();

		self
	}

	/// Requires an HTTPS base URL.
	pub fn require_https(mut self, required: bool) -> Self {
		self.require_https = required;

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<ClientConfig, ClientConfigError> {
		let base_url = self.base_url.ok_or(ClientConfigError::MissingBaseUrl)?;

		match base_url.scheme() {
			"https" => (),
			"http" if !self.require_https => (),
			"http" =>
				return Err(ClientConfigError::InsecureBaseUrl { url: base_url.to_string() }),
			_ => return Err(ClientConfigError::UnsupportedScheme { url: base_url.to_string() }),
		}

		validate_path("login", &self.endpoints.login)?;
		validate_path("signup", &self.endpoints.signup)?;
		validate_path("refresh", &self.endpoints.refresh)?;
		validate_token_type(&self.default_token_type)?;

		Ok(ClientConfig {
			base_url,
			endpoints: self.endpoints,
			login_entry_point: self.login_entry_point,
			default_token_type: self.default_token_type,
		})
	}
}

fn validate_path(endpoint: &'static str, path: &str) -> Result<(), ClientConfigError> {
	if path.starts_with('/') && !path.chars().any(char::is_whitespace) {
		Ok(())
	} else {
		Err(ClientConfigError::InvalidPath { endpoint, path: path.to_owned() })
	}
}

fn validate_token_type(token_type: &str) -> Result<(), ClientConfigError> {
	if !token_type.is_empty() && !token_type.chars().any(|c| c.is_whitespace() || c.is_control())
	{
		Ok(())
	} else {
		Err(ClientConfigError::InvalidTokenType { token_type: token_type.to_owned() })
	}
}
