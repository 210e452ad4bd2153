//! Stored credential pair and the token grant payload returned by login/refresh endpoints.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Authorization scheme used when neither the backend nor the config supplies one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Errors raised when a token grant cannot become a [`CredentialPair`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialError {
	/// The grant carried an empty access token.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// The grant carried an empty refresh token.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
}

/// Access + refresh token pair persisted between requests.
///
/// Both secrets are mandatory, so a stored pair can never hold one token without the other.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived token attached to protected requests.
	pub access_token: TokenSecret,
	/// Longer-lived token used only against the refresh endpoint.
	pub refresh_token: TokenSecret,
	/// Authorization scheme reported by the backend, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,
	/// Instant the pair was last written.
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}
impl CredentialPair {
	/// Creates a pair stamped with the current UTC instant.
	pub fn new(access_token: impl Into<TokenSecret>, refresh_token: impl Into<TokenSecret>) -> Self {
		Self {
			access_token: access_token.into(),
			refresh_token: refresh_token.into(),
			token_type: None,
			updated_at: OffsetDateTime::now_utc(),
		}
	}

	/// Sets the authorization scheme.
	pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Overrides the write timestamp.
	pub fn with_updated_at(mut self, instant: OffsetDateTime) -> Self {
		self.updated_at = instant;

		self
	}

	/// Returns the stored scheme, falling back to `default`.
	pub fn token_type_or<'a>(&'a self, default: &'a str) -> &'a str {
		self.token_type.as_deref().filter(|kind| !kind.trim().is_empty()).unwrap_or(default)
	}

	/// Renders the `Authorization` header value (`<type> <token>`).
	pub fn authorization_value(&self, default_type: &str) -> String {
		format!("{} {}", self.token_type_or(default_type), self.access_token.expose())
	}

	/// Checks that neither secret is blank.
	pub fn validate(&self) -> Result<(), CredentialError> {
		if self.access_token.is_blank() {
			return Err(CredentialError::MissingAccessToken);
		}
		if self.refresh_token.is_blank() {
			return Err(CredentialError::MissingRefreshToken);
		}

		Ok(())
	}
}
impl Debug for CredentialPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPair")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("updated_at", &self.updated_at)
			.finish()
	}
}

/// Token payload carried in the `data` field of login and refresh responses.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Newly issued refresh token.
	pub refresh_token: TokenSecret,
	/// Authorization scheme, when the backend reports one.
	#[serde(default)]
	pub token_type: Option<String>,
}
impl TokenGrant {
	/// Converts the grant into a pair that fully replaces `previous`.
	///
	/// Both secrets come from the grant. The scheme is taken from the grant when present and
	/// otherwise carried over from `previous`.
	pub fn into_credentials(
		self,
		previous: Option<&CredentialPair>,
	) -> Result<CredentialPair, CredentialError> {
		let token_type = self
			.token_type
			.filter(|kind| !kind.trim().is_empty())
			.or_else(|| previous.and_then(|pair| pair.token_type.clone()));
		let pair = CredentialPair {
			access_token: self.access_token,
			refresh_token: self.refresh_token,
			token_type,
			updated_at: OffsetDateTime::now_utc(),
		};

		pair.validate()?;

		Ok(pair)
	}
}
impl Debug for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGrant")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn grant(access: &str, refresh: &str, token_type: Option<&str>) -> TokenGrant {
		TokenGrant {
			access_token: access.into(),
			refresh_token: refresh.into(),
			token_type: token_type.map(str::to_owned),
		}
	}

	#[test]
	fn authorization_value_defaults_to_bearer() {
		let pair = CredentialPair::new("A1", "R1");

		assert_eq!(pair.authorization_value(DEFAULT_TOKEN_TYPE), "Bearer A1");
		assert_eq!(pair.with_token_type("bearer").authorization_value("Bearer"), "bearer A1");
	}

	#[test]
	fn grant_replaces_both_secrets_and_keeps_previous_scheme() {
		let previous = CredentialPair::new("A1", "R1").with_token_type("Token");
		let rotated = grant("A2", "R2", None)
			.into_credentials(Some(&previous))
			.expect("Grant with both secrets should convert.");

		assert_eq!(rotated.access_token.expose(), "A2");
		assert_eq!(rotated.refresh_token.expose(), "R2");
		assert_eq!(rotated.token_type.as_deref(), Some("Token"));

		let reissued = grant("A3", "R3", Some("bearer"))
			.into_credentials(Some(&rotated))
			.expect("Grant with an explicit scheme should convert.");

		assert_eq!(reissued.token_type.as_deref(), Some("bearer"));
	}

	#[test]
	fn grant_rejects_blank_secrets() {
		assert_eq!(
			grant("", "R1", None).into_credentials(None).expect_err("Blank access token."),
			CredentialError::MissingAccessToken,
		);
		assert_eq!(
			grant("A1", " ", None).into_credentials(None).expect_err("Blank refresh token."),
			CredentialError::MissingRefreshToken,
		);
	}

	#[test]
	fn pair_debug_redacts_and_serializes_rfc3339() {
		let pair = CredentialPair::new("A1", "R1").with_updated_at(datetime!(2025-03-02 08:30 UTC));
		let debug = format!("{pair:?}");

		assert!(!debug.contains("A1"));
		assert!(!debug.contains("R1"));

		let json = serde_json::to_value(&pair).expect("Credential pair should serialize.");

		assert_eq!(json["access_token"], "A1");
		assert_eq!(json["updated_at"], "2025-03-02T08:30:00Z");
		assert!(json.get("token_type").is_none());
	}
}
