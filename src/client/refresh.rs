//! Token refresh with a single shared in-flight exchange.
//!
//! [`AuthClient::refresh`] exchanges the stored refresh token for a new pair. Every caller that
//! asks for a refresh while one is already running joins that exchange instead of starting its
//! own, so the refresh endpoint sees at most one call per expiry. The slot holding the pending
//! exchange is owned by the client and is emptied as soon as the exchange settles, whether it
//! succeeded or failed.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use http::Method;
// self
use crate::{
	_prelude::*,
	api::{self, ApiErrorBody},
	auth::{CredentialPair, TokenGrant},
	client::AuthClient,
	error::RefreshError,
	http::HttpTransport,
	obs::{self, CallKind, CallOutcome, CallSpan},
	redirect::UnauthenticatedReason,
};

type RefreshOutcome = std::result::Result<CredentialPair, RefreshError>;
type PendingRefresh = Arc<OnceCell<RefreshOutcome>>;

/// Slot holding the refresh currently in flight, if any.
pub(crate) type PendingSlot = Mutex<Option<PendingRefresh>>;

#[derive(Serialize)]
struct RefreshBody<'a> {
	refresh_token: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	access_token: Option<&'a str>,
}

impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Refreshes the stored credential pair, joining a refresh already in flight.
	///
	/// On success the new pair has been persisted before this returns. On failure the stored
	/// credentials have been cleared and the redirect hook has fired; every joined caller
	/// receives the same [`Error::RefreshFailed`] reason.
	pub async fn refresh(&self) -> Result<CredentialPair> {
		self.refresh_rejected(None).await
	}

	/// Refreshes after `rejected` was turned down by the backend.
	///
	/// When the stored access token no longer matches `rejected`, another caller already
	/// rotated the pair and the stored one is returned without contacting the refresh endpoint.
	pub(crate) async fn refresh_rejected(&self, rejected: Option<&str>) -> Result<CredentialPair> {
		let (pending, leader) = self.join_or_start_refresh();
		let _reset = leader.then(|| PendingReset { slot: &self.pending_refresh, pending: &pending });

		if !leader {
			self.refresh_metrics.record_join();
			obs::trace_event!(debug, "joining in-flight token refresh");
		}

		// A joiner runs the exchange itself if the leader was dropped before finishing.
		let outcome = pending.get_or_init(|| self.run_refresh(rejected)).await;

		outcome.clone().map_err(Error::RefreshFailed)
	}

	fn join_or_start_refresh(&self) -> (PendingRefresh, bool) {
		let mut slot = self.pending_refresh.lock();

		if let Some(pending) = slot.as_ref() {
			return (pending.clone(), false);
		}

		let pending = Arc::new(OnceCell::new());

		*slot = Some(pending.clone());

		(pending, true)
	}

	async fn run_refresh(&self, rejected: Option<&str>) -> RefreshOutcome {
		const KIND: CallKind = CallKind::Refresh;

		if let Some(current) = self.rotated_since(rejected).await {
			obs::trace_event!(debug, "access token already rotated; skipping refresh");

			return Ok(current);
		}

		let span = CallSpan::new(KIND, "refresh");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);
		self.refresh_metrics.record_attempt();
		obs::trace_event!(debug, "starting token refresh");

		let outcome = span.instrument(self.exchange_refresh_token()).await;

		match &outcome {
			Ok(_) => {
				self.refresh_metrics.record_success();
				obs::record_call_outcome(KIND, CallOutcome::Success);
				obs::trace_event!(debug, "token refresh succeeded");
			},
			Err(_e) => {
				self.refresh_metrics.record_failure();
				obs::record_call_outcome(KIND, CallOutcome::Failure);
				obs::trace_event!(warn, error = %_e, "token refresh failed");
				self.end_session(UnauthenticatedReason::RefreshFailed).await;
			},
		}

		outcome
	}

	/// Returns the stored pair when its access token differs from `rejected`.
	///
	/// Store failures fall through to a regular exchange, which reports them.
	async fn rotated_since(&self, rejected: Option<&str>) -> Option<CredentialPair> {
		let rejected = rejected?;
		let current = self.store.load().await.ok().flatten()?;

		(current.access_token.expose() != rejected).then_some(current)
	}

	async fn exchange_refresh_token(&self) -> RefreshOutcome {
		let current = self
			.store
			.load()
			.await
			.map_err(|e| RefreshError::Storage { message: summarize(&e) })?
			.ok_or(RefreshError::MissingRefreshToken)?;

		if current.refresh_token.is_blank() {
			return Err(RefreshError::MissingRefreshToken);
		}

		let endpoint = self.config.endpoints.refresh.as_str();
		let body = RefreshBody {
			refresh_token: current.refresh_token.expose(),
			access_token: Some(current.access_token.expose()).filter(|token| !token.is_empty()),
		};
		let request = self
			.json_request(Method::POST, endpoint, &body)
			.map_err(|e| RefreshError::Config { message: summarize(&e) })?;
		let response = self
			.transport
			.execute(request)
			.await
			.map_err(|e| RefreshError::Transport { message: summarize(&e) })?;
		let status = response.status();

		if !status.is_success() {
			let code = ApiErrorBody::parse(&response).code;

			return Err(RefreshError::Rejected { status: status.as_u16(), code });
		}

		let grant: TokenGrant = api::decode_data(endpoint, &response)
			.map_err(|e| RefreshError::Decode { message: summarize(&e) })?;
		let updated = grant
			.into_credentials(Some(&current))
			.map_err(|e| RefreshError::Decode { message: summarize(&e) })?;

		self.store
			.save(updated.clone())
			.await
			.map_err(|e| RefreshError::Storage { message: summarize(&e) })?;

		Ok(updated)
	}
}

/// Empties the pending slot when the leading caller finishes or is dropped.
struct PendingReset<'a> {
	slot: &'a PendingSlot,
	pending: &'a PendingRefresh,
}
impl Drop for PendingReset<'_> {
	fn drop(&mut self) {
		let mut slot = self.slot.lock();

		if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, self.pending)) {
			*slot = None;
		}
	}
}

/// Flattens an error and its sources into one line.
fn summarize(err: &dyn StdError) -> String {
	let mut message = err.to_string();
	let mut source = err.source();

	while let Some(cause) = source {
		message.push_str(": ");
		message.push_str(&cause.to_string());

		source = cause.source();
	}

	message
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{_preludet::*, error::TransportError, http::TransportFuture};

	const REFRESH_PATH: &str = "/api/auth/refresh";

	#[tokio::test]
	async fn concurrent_refreshes_share_one_exchange() {
		let started = Arc::new(AtomicUsize::new(0));
		let gate = started.clone();
		let transport = ScriptedTransport::new(move |_request| -> TransportFuture<'static> {
			let gate = gate.clone();

			Box::pin(async move {
				// Hold the exchange open until every caller has asked for a refresh.
				while gate.load(Ordering::SeqCst) < 3 {
					tokio::task::yield_now().await;
				}

				json_response(200, &token_body("A2", "R2"))
			})
		});
		let (client, store, redirect) =
			build_scripted_client(transport.clone(), Some(CredentialPair::new("A1", "R1")));
		let call = || {
			let client = client.clone();
			let started = started.clone();

			async move {
				started.fetch_add(1, Ordering::SeqCst);

				client.refresh().await
			}
		};
		let (first, second, third) = tokio::join!(call(), call(), call());

		for outcome in [first, second, third] {
			let pair = outcome.expect("Every caller should observe the shared refresh result.");

			assert_eq!(pair.access_token.expose(), "A2");
		}

		assert_eq!(transport.calls_to(REFRESH_PATH), 1);
		assert_eq!(client.refresh_metrics.attempts(), 1);
		assert_eq!(client.refresh_metrics.joins(), 2);
		assert_eq!(client.refresh_metrics.successes(), 1);
		assert!(!client.refresh_in_flight());
		assert_eq!(
			store.snapshot().expect("Rotated pair should be stored.").refresh_token.expose(),
			"R2"
		);
		assert_eq!(redirect.count(), 0);

		let body: serde_json::Value = serde_json::from_str(&transport.requests()[0].body)
			.expect("Refresh body should be JSON.");

		assert_eq!(body, serde_json::json!({ "refresh_token": "R1", "access_token": "A1" }));
	}

	#[tokio::test]
	async fn rejected_refresh_clears_credentials_and_fails_every_waiter() {
		let started = Arc::new(AtomicUsize::new(0));
		let gate = started.clone();
		let transport = ScriptedTransport::new(move |_request| -> TransportFuture<'static> {
			let gate = gate.clone();

			Box::pin(async move {
				while gate.load(Ordering::SeqCst) < 2 {
					tokio::task::yield_now().await;
				}

				json_response(403, r#"{"code":"AUTHORIZATION_FAILED","message":"Expired."}"#)
			})
		});
		let (client, store, redirect) =
			build_scripted_client(transport.clone(), Some(CredentialPair::new("A1", "R1")));
		let call = || {
			let client = client.clone();
			let started = started.clone();

			async move {
				started.fetch_add(1, Ordering::SeqCst);

				client.refresh().await
			}
		};
		let (first, second) = tokio::join!(call(), call());
		let expected = RefreshError::Rejected {
			status: 403,
			code: Some("AUTHORIZATION_FAILED".into()),
		};

		for outcome in [first, second] {
			match outcome {
				Err(Error::RefreshFailed(reason)) => assert_eq!(reason, expected),
				other => panic!("Expected a shared refresh failure, got {other:?}."),
			}
		}

		assert_eq!(transport.calls_to(REFRESH_PATH), 1);
		assert!(store.snapshot().is_none());
		assert_eq!(redirect.reasons(), vec![UnauthenticatedReason::RefreshFailed]);
		assert_eq!(client.refresh_metrics.failures(), 1);
		assert!(!client.refresh_in_flight());
	}

	#[tokio::test]
	async fn settled_refresh_frees_the_slot_for_the_next_expiry() {
		let issued = Arc::new(AtomicUsize::new(1));
		let counter = issued.clone();
		let transport = ScriptedTransport::new(move |_request| -> TransportFuture<'static> {
			let generation = counter.fetch_add(1, Ordering::SeqCst) + 1;

			Box::pin(async move {
				json_response(200, &token_body(&format!("A{generation}"), &format!("R{generation}")))
			})
		});
		let (client, _store, _redirect) =
			build_scripted_client(transport.clone(), Some(CredentialPair::new("A1", "R1")));
		let first = client.refresh().await.expect("First refresh should succeed.");
		let second = client.refresh().await.expect("Second refresh should start a new exchange.");

		assert_eq!(first.access_token.expose(), "A2");
		assert_eq!(second.access_token.expose(), "A3");
		assert_eq!(transport.calls_to(REFRESH_PATH), 2);

		let bodies: Vec<String> =
			transport.requests().into_iter().map(|request| request.body).collect();

		assert!(bodies[1].contains("\"refresh_token\":\"R2\""));
	}

	#[tokio::test]
	async fn refresh_without_stored_pair_fails_without_network() {
		let transport = ScriptedTransport::new(|_request| -> TransportFuture<'static> {
			Box::pin(async { json_response(200, &token_body("A2", "R2")) })
		});
		let (client, _store, redirect) = build_scripted_client(transport.clone(), None);
		let err = client.refresh().await.expect_err("Refreshing with no pair should fail.");

		assert!(matches!(err, Error::RefreshFailed(RefreshError::MissingRefreshToken)));
		assert!(transport.requests().is_empty());
		assert_eq!(redirect.reasons(), vec![UnauthenticatedReason::RefreshFailed]);
		assert!(!client.refresh_in_flight());
	}

	#[tokio::test]
	async fn malformed_refresh_body_ends_the_session() {
		let transport = ScriptedTransport::new(|_request| -> TransportFuture<'static> {
			Box::pin(async { json_response(200, r#"{"data":{"access_token":"A2"}}"#) })
		});
		let (client, store, redirect) =
			build_scripted_client(transport, Some(CredentialPair::new("A1", "R1")));
		let err = client.refresh().await.expect_err("A grant without a refresh token is invalid.");

		match err {
			Error::RefreshFailed(RefreshError::Decode { message }) =>
				assert!(message.contains("refresh_token"), "unexpected message: {message}"),
			other => panic!("Expected a decode failure, got {other:?}."),
		}

		assert!(store.snapshot().is_none());
		assert_eq!(redirect.count(), 1);
	}

	#[tokio::test]
	async fn unreachable_refresh_endpoint_ends_the_session() {
		let transport = ScriptedTransport::new(|request| -> TransportFuture<'static> {
			Box::pin(async move {
				match request.path.as_str() {
					REFRESH_PATH => Err(TransportError::Io(std::io::Error::new(
						std::io::ErrorKind::ConnectionRefused,
						"connection refused",
					))),
					_ => json_response(401, r#"{"code":"AUTHORIZATION_FAILED"}"#),
				}
			})
		});
		let (client, store, redirect) =
			build_scripted_client(transport.clone(), Some(CredentialPair::new("A1", "R1")));
		let err = client.get("/timetable").await.expect_err("Unreachable refresh should fail.");

		match err {
			Error::RefreshFailed(RefreshError::Transport { message }) =>
				assert!(message.contains("connection refused")),
			other => panic!("Expected a transport refresh failure, got {other:?}."),
		}

		assert_eq!(transport.calls_to(REFRESH_PATH), 1);
		assert_eq!(transport.calls_to("/api/timetable"), 1);
		assert!(store.snapshot().is_none());
		assert_eq!(redirect.reasons(), vec![UnauthenticatedReason::RefreshFailed]);
		assert_eq!(client.refresh_metrics.failures(), 1);
		assert!(!client.refresh_in_flight());
	}
}
