//! The authenticated client: bearer-token requests, coalesced refresh, and session calls.

pub mod refresh;
pub mod request;
pub mod session;

pub use refresh::*;
pub use request::*;
pub use session::*;

// crates.io
use http::{
	HeaderValue, Method,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	error::ConfigError,
	http::{ApiRequest, HttpTransport},
	obs,
	redirect::{LoginRedirect, NoopRedirect, UnauthenticatedReason},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestAuthClient = AuthClient<ReqwestTransport>;

/// Issues API requests with the stored bearer token and recovers from expired access tokens.
///
/// The client owns the transport, the credential store handle, the config, and the redirect
/// hook. Clones share the pending-refresh slot and the refresh metrics, so concurrent callers
/// on any clone coalesce onto the same refresh. Separately constructed clients never
/// interfere with each other.
pub struct AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Transport used for every outbound request.
	pub transport: Arc<T>,
	/// Store holding the credential pair.
	pub store: Arc<dyn CredentialStore>,
	/// Validated client configuration.
	pub config: ClientConfig,
	/// Hook invoked when the session ends.
	pub redirect: Arc<dyn LoginRedirect>,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	pending_refresh: Arc<PendingSlot>,
}
impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(
		store: Arc<dyn CredentialStore>,
		config: ClientConfig,
		transport: impl Into<Arc<T>>,
	) -> Self {
		Self {
			transport: transport.into(),
			store,
			config,
			redirect: Arc::new(NoopRedirect),
			refresh_metrics: Default::default(),
			pending_refresh: Default::default(),
		}
	}

	/// Sets or replaces the hook invoked when the session ends.
	pub fn with_redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
		self.redirect = redirect;

		self
	}

	/// Returns `true` when a refresh is currently in flight.
	pub fn refresh_in_flight(&self) -> bool {
		self.pending_refresh.lock().is_some()
	}

	/// Builds a JSON request for `target` without credentials attached.
	pub fn json_request<B>(&self, method: Method, target: &str, body: &B) -> Result<ApiRequest>
	where
		B: ?Sized + Serialize,
	{
		let payload = serde_json::to_vec(body).map_err(ConfigError::Serialize)?;
		let mut request = self.empty_request(method, target)?;

		*request.body_mut() = payload;
		request.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(request)
	}

	/// Builds a body-less request for `target` without credentials attached.
	pub fn empty_request(&self, method: Method, target: &str) -> Result<ApiRequest> {
		let url = self.config.resolve(target)?;
		let request = http::Request::builder()
			.method(method)
			.uri(url.as_str())
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.body(Vec::new())
			.map_err(ConfigError::from)?;

		Ok(request)
	}

	/// Clears credentials and notifies the redirect hook.
	pub(crate) async fn end_session(&self, reason: UnauthenticatedReason) {
		if let Err(_e) = self.store.clear().await {
			obs::trace_event!(warn, error = %_e, "failed to clear credentials");
		}

		self.notify_redirect(reason);
	}

	pub(crate) fn notify_redirect(&self, reason: UnauthenticatedReason) {
		obs::trace_event!(
			warn,
			reason = reason.as_str(),
			location = %self.config.login_entry_point,
			"session ended; redirecting to login"
		);

		self.redirect.redirect_to_login(&self.config.login_entry_point, reason);
	}
}
#[cfg(feature = "reqwest")]
impl AuthClient<ReqwestTransport> {
	/// Creates a new client with its own reqwest-backed transport.
	pub fn new(store: Arc<dyn CredentialStore>, config: ClientConfig) -> Self {
		Self::with_transport(store, config, ReqwestTransport::default())
	}
}
impl<T> Clone for AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			config: self.config.clone(),
			redirect: self.redirect.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			pending_refresh: self.pending_refresh.clone(),
		}
	}
}
impl<T> Debug for AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthClient")
			.field("config", &self.config)
			.field("refresh_in_flight", &self.refresh_in_flight())
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}
