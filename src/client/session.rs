//! Sign-in, sign-up, and sign-out.

// crates.io
use http::{Method, StatusCode};
// self
use crate::{
	_prelude::*,
	api::{self, Account, ApiErrorBody},
	auth::{CredentialPair, TokenGrant},
	client::AuthClient,
	error::InvalidField,
	http::HttpTransport,
	obs::{self, CallKind, CallOutcome, CallSpan},
};

#[derive(Serialize)]
struct LoginBody<'a> {
	username: &'a str,
	password: &'a str,
}

/// Form submitted to the signup endpoint.
#[derive(Clone, Serialize)]
pub struct SignupRequest {
	/// Desired username.
	pub username: String,
	/// Contact email.
	pub email: String,
	/// Plain-text password; sent only over the configured transport.
	pub password: String,
	/// School-issued token binding the account to a student or teacher record.
	pub identify_token: String,
}
impl SignupRequest {
	/// Builds a signup form, trimming surrounding whitespace from the identify token.
	pub fn new(
		username: impl Into<String>,
		email: impl Into<String>,
		password: impl Into<String>,
		identify_token: impl AsRef<str>,
	) -> Self {
		Self {
			username: username.into(),
			email: email.into(),
			password: password.into(),
			identify_token: identify_token.as_ref().trim().to_owned(),
		}
	}
}
impl Debug for SignupRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignupRequest")
			.field("username", &self.username)
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.field("identify_token", &self.identify_token)
			.finish()
	}
}

impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Exchanges a username and password for a credential pair and stores it.
	///
	/// A 401 naming a field (`detail.invalid`) becomes [`Error::InvalidLogin`]; other failures
	/// become [`Error::Api`]. The redirect hook never fires from here.
	pub async fn login(&self, username: &str, password: &str) -> Result<CredentialPair> {
		const KIND: CallKind = CallKind::Login;

		let span = CallSpan::new(KIND, "login");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let endpoint = self.config.endpoints.login.as_str();
				let request = self.json_request(
					Method::POST,
					endpoint,
					&LoginBody { username, password },
				)?;
				let response = self.transport.execute(request).await?;

				if response.status() == StatusCode::UNAUTHORIZED
					&& let Some(field) = ApiErrorBody::parse(&response).invalid_field()
				{
					return Err(Error::InvalidLogin { field });
				}

				api::ensure_success(&response)?;

				let grant: TokenGrant = api::decode_data(endpoint, &response)?;
				let credentials = grant.into_credentials(None)?;

				self.store.save(credentials.clone()).await?;

				Ok(credentials)
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	/// Creates an account. The new account is not signed in.
	///
	/// A 401 or 409 naming a field becomes [`Error::InvalidSignup`].
	pub async fn signup(&self, form: &SignupRequest) -> Result<Account> {
		const KIND: CallKind = CallKind::Signup;

		let span = CallSpan::new(KIND, "signup");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let endpoint = self.config.endpoints.signup.as_str();
				let request = self.json_request(Method::POST, endpoint, form)?;
				let response = self.transport.execute(request).await?;
				let status = response.status();

				if (status == StatusCode::UNAUTHORIZED || status == StatusCode::CONFLICT)
					&& let Some(field) = ApiErrorBody::parse(&response).invalid_field()
				{
					return Err(Error::InvalidSignup { field });
				}

				api::ensure_success(&response)?;

				Ok(api::decode_data(endpoint, &response)?)
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	/// Forgets the stored credential pair. The redirect hook does not fire.
	pub async fn logout(&self) -> Result<()> {
		self.store.clear().await?;
		obs::trace_event!(debug, "credentials cleared by logout");

		Ok(())
	}

	/// Returns `true` when a credential pair is stored.
	///
	/// The pair may still be expired; the next request finds out.
	pub async fn is_authenticated(&self) -> Result<bool> {
		Ok(self.store.load().await?.is_some())
	}
}

fn record_outcome<V>(kind: CallKind, result: &Result<V>) {
	match result {
		Ok(_) => obs::record_call_outcome(kind, CallOutcome::Success),
		Err(_) => obs::record_call_outcome(kind, CallOutcome::Failure),
	}
}

/// Returns the field a signup or login error points at, if any.
pub fn invalid_field_of(err: &Error) -> Option<InvalidField> {
	match err {
		Error::InvalidLogin { field } | Error::InvalidSignup { field } => Some(*field),
		_ => None,
	}
}
