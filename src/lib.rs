//! Authenticated client for the school timetable API.
//!
//! Requests carry the stored bearer token and recover from an expired session with a single
//! coalesced refresh. Typed calls cover sessions, timetables, themes, and accounts.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod redirect;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use ::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
	// self
	use crate::{
		auth::CredentialPair,
		client::AuthClient,
		config::ClientConfig,
		error::TransportError,
		http::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
		redirect::{LoginRedirect, UnauthenticatedReason},
		store::{CredentialStore, MemoryStore},
	};

	type Handler = dyn Fn(RecordedRequest) -> TransportFuture<'static> + Send + Sync;

	/// Client type alias used by transport-free tests.
	pub type ScriptedTestClient = AuthClient<ScriptedTransport>;

	/// Snapshot of a request observed by [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// HTTP method.
		pub method: ::http::Method,
		/// Request path (no query string).
		pub path: String,
		/// Raw `Authorization` header, when present.
		pub authorization: Option<String>,
		/// All request headers.
		pub headers: ::http::HeaderMap,
		/// Body decoded as UTF-8 (lossy).
		pub body: String,
	}

	/// In-process transport that answers requests from a scripted async handler and records
	/// every request it receives.
	#[derive(Clone)]
	pub struct ScriptedTransport {
		handler: Arc<Handler>,
		requests: Arc<Mutex<Vec<RecordedRequest>>>,
	}
	impl ScriptedTransport {
		/// Wraps the provided handler.
		pub fn new<F>(handler: F) -> Self
		where
			F: 'static + Fn(RecordedRequest) -> TransportFuture<'static> + Send + Sync,
		{
			Self { handler: Arc::new(handler), requests: Default::default() }
		}

		/// Returns every request observed so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.requests.lock().clone()
		}

		/// Counts requests whose path equals `path`.
		pub fn calls_to(&self, path: &str) -> usize {
			self.requests.lock().iter().filter(|request| request.path == path).count()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
			let recorded = RecordedRequest {
				method: request.method().clone(),
				path: request.uri().path().to_owned(),
				authorization: request
					.headers()
					.get(AUTHORIZATION)
					.and_then(|value| value.to_str().ok())
					.map(str::to_owned),
				headers: request.headers().clone(),
				body: String::from_utf8_lossy(request.body()).into_owned(),
			};

			self.requests.lock().push(recorded.clone());

			(self.handler)(recorded)
		}
	}

	/// Builds a JSON response with the provided status.
	pub fn json_response(status: u16, body: &str) -> Result<ApiResponse, TransportError> {
		let mut response = ApiResponse::new(body.as_bytes().to_vec());

		*response.status_mut() = StatusCode::from_u16(status)
			.expect("Scripted responses must use a valid HTTP status code.");
		response
			.headers_mut()
			.insert(::http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(response)
	}

	/// Builds an enveloped token-pair body, matching the backend's `{meta, data}` shape.
	pub fn token_body(access: &str, refresh: &str) -> String {
		format!(
			"{{\"meta\":{{\"user_id\":null,\"status\":200}},\"data\":{{\"access_token\":\"{access}\",\"refresh_token\":\"{refresh}\",\"token_type\":\"bearer\"}}}}"
		)
	}

	/// Redirect hook that records every reason it was invoked with.
	#[derive(Debug, Default)]
	pub struct RecordingRedirect {
		reasons: Mutex<Vec<UnauthenticatedReason>>,
		count: AtomicUsize,
	}
	impl RecordingRedirect {
		/// Returns the recorded reasons in invocation order.
		pub fn reasons(&self) -> Vec<UnauthenticatedReason> {
			self.reasons.lock().clone()
		}

		/// Returns how many times the hook fired.
		pub fn count(&self) -> usize {
			self.count.load(Ordering::SeqCst)
		}
	}
	impl LoginRedirect for RecordingRedirect {
		fn redirect_to_login(&self, _login_entry_point: &str, reason: UnauthenticatedReason) {
			self.count.fetch_add(1, Ordering::SeqCst);
			self.reasons.lock().push(reason);
		}
	}

	/// Config pointing at a placeholder origin; scripted transports ignore the host.
	pub fn test_config() -> ClientConfig {
		let base = Url::parse("http://timetable.test/api").expect("Test base URL should parse.");

		ClientConfig::builder(base).build().expect("Default test config should validate.")
	}

	/// Constructs a client backed by a scripted transport, in-memory store, and recording
	/// redirect hook, optionally seeding credentials.
	pub fn build_scripted_client(
		transport: ScriptedTransport,
		seed: Option<CredentialPair>,
	) -> (ScriptedTestClient, Arc<MemoryStore>, Arc<RecordingRedirect>) {
		let store_backend = Arc::new(match seed {
			Some(pair) => MemoryStore::with_credentials(pair),
			None => MemoryStore::default(),
		});
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let redirect = Arc::new(RecordingRedirect::default());
		let client = AuthClient::with_transport(store, test_config(), transport)
			.with_redirect(redirect.clone());

		(client, store_backend, redirect)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::OnceCell;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
