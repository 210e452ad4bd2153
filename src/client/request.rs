//! Authorized requests with a single refresh-and-retry on 401/403.

// crates.io
use http::{
	HeaderValue, Method, StatusCode,
	header::{ACCEPT, AUTHORIZATION},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	client::AuthClient,
	error::ConfigError,
	http::{ApiRequest, ApiResponse, HttpTransport, duplicate_request},
	obs::{self, CallKind, CallOutcome, CallSpan},
	redirect::UnauthenticatedReason,
};

/// Marks whether a logical request has already been retried after a refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt {
	/// Initial dispatch; an auth failure may trigger one refresh.
	First,
	/// Dispatch after a refresh; an auth failure ends the session.
	Retried,
}
impl Attempt {
	/// Returns `true` when an auth failure on this attempt may trigger a refresh.
	pub const fn may_refresh(self) -> bool {
		matches!(self, Self::First)
	}
}

/// Returns `true` for statuses treated as an expired or rejected access token.
///
/// The backend answers with 403 for some expired tokens, so both 401 and 403 qualify.
pub fn is_auth_failure(status: StatusCode) -> bool {
	status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Sends `request` with the stored bearer token.
	///
	/// Relative URIs (`/timetable`) are resolved against the configured base URL. Caller
	/// headers are kept except `Authorization` and `Accept`, which the client owns.
	///
	/// - No stored pair: the redirect hook fires and [`Error::NoCredential`] is returned without
	///   any network call.
	/// - 401/403: the token is refreshed (or an in-flight refresh is joined) and the request is
	///   sent once more with the new token. If the pair was already rotated after this request
	///   left, the stored token is reused without another refresh.
	/// - 401/403 again: credentials are cleared, the redirect hook fires, and
	///   [`Error::UnauthorizedAfterRetry`] is returned.
	/// - Anything else, including other error statuses, is returned as-is.
	pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: CallKind = CallKind::Request;

		let span = CallSpan::new(KIND, "request");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let call = span.clone();
		let result = span
			.instrument(async move {
				let template = self.resolve_request(request)?;
				let mut attempt = Attempt::First;

				loop {
					let (response, sent) = self.send_authorized(&template).await?;
					let status = response.status();

					call.observe_status(status.as_u16());

					if !is_auth_failure(status) {
						return Ok(response);
					}
					if !attempt.may_refresh() {
						self.end_session(UnauthenticatedReason::UnauthorizedAfterRetry).await;

						return Err(Error::UnauthorizedAfterRetry { status: status.as_u16() });
					}

					obs::trace_event!(
						debug,
						status = status.as_u16(),
						uri = %template.uri(),
						"access token rejected; refreshing"
					);

					self.refresh_rejected(Some(sent.expose())).await?;

					attempt = Attempt::Retried;
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	/// Sends an authorized `GET` for `target`.
	pub async fn get(&self, target: &str) -> Result<ApiResponse> {
		self.request(self.empty_request(Method::GET, target)?).await
	}

	/// Sends an authorized `DELETE` for `target`.
	pub async fn delete(&self, target: &str) -> Result<ApiResponse> {
		self.request(self.empty_request(Method::DELETE, target)?).await
	}

	/// Sends an authorized request with a JSON body.
	pub async fn send_json<B>(&self, method: Method, target: &str, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.request(self.json_request(method, target, body)?).await
	}

	fn resolve_request(&self, mut request: ApiRequest) -> Result<ApiRequest> {
		if request.uri().scheme().is_some() {
			return Ok(request);
		}

		let target = request.uri().path_and_query().map_or("/", |target| target.as_str());
		let url = self.config.resolve(target)?;

		*request.uri_mut() = url
			.as_str()
			.parse()
			.map_err(|source| ConfigError::InvalidUri { url: url.to_string(), source })?;

		Ok(request)
	}

	/// Sends `template` with the stored credentials and returns the access token it carried.
	async fn send_authorized(&self, template: &ApiRequest) -> Result<(ApiResponse, TokenSecret)> {
		let Some(credentials) = self.store.load().await? else {
			self.notify_redirect(UnauthenticatedReason::NoCredential);

			return Err(Error::NoCredential);
		};
		let mut authorization =
			HeaderValue::from_str(&credentials.authorization_value(&self.config.default_token_type))
				.map_err(|_| ConfigError::InvalidHeaderValue { header: "Authorization" })?;

		authorization.set_sensitive(true);

		let mut request = duplicate_request(template);
		let headers = request.headers_mut();

		headers.insert(AUTHORIZATION, authorization);
		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		let response = self.transport.execute(request).await?;

		Ok((response, credentials.access_token))
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{_preludet::*, auth::CredentialPair, http::TransportFuture};

	const TIMETABLE_PATH: &str = "/api/timetable";
	const REFRESH_PATH: &str = "/api/auth/refresh";
	const EXPIRED_BODY: &str = r#"{"code":"AUTHORIZATION_FAILED","message":"Token expired."}"#;

	/// Backend that accepts only `A2` and rotates `A1`/`R1` into `A2`/`R2`.
	fn rotating_backend() -> ScriptedTransport {
		ScriptedTransport::new(|request| -> TransportFuture<'static> {
			Box::pin(async move {
				match (request.path.as_str(), request.authorization.as_deref()) {
					(REFRESH_PATH, _) => json_response(200, &token_body("A2", "R2")),
					(_, Some("bearer A2")) => json_response(200, r#"{"ok":true}"#),
					_ => json_response(401, EXPIRED_BODY),
				}
			})
		})
	}

	fn request_to(target: &str) -> ApiRequest {
		http::Request::builder()
			.method(Method::GET)
			.uri(target)
			.header("x-request-id", "req-7")
			.header(AUTHORIZATION, "Bearer caller-supplied")
			.body(Vec::new())
			.expect("Test request should build.")
	}

	#[tokio::test]
	async fn expired_token_is_refreshed_and_request_retried() {
		let transport = rotating_backend();
		let seed = CredentialPair::new("A1", "R1").with_token_type("bearer");
		let (client, store, redirect) = build_scripted_client(transport.clone(), Some(seed));
		let response =
			client.request(request_to("/timetable")).await.expect("Retried request should pass.");

		assert_eq!(response.status(), StatusCode::OK);

		let requests = transport.requests();
		let paths: Vec<&str> = requests.iter().map(|request| request.path.as_str()).collect();

		assert_eq!(paths, [TIMETABLE_PATH, REFRESH_PATH, TIMETABLE_PATH]);
		assert_eq!(requests[0].authorization.as_deref(), Some("bearer A1"));
		assert_eq!(requests[2].authorization.as_deref(), Some("bearer A2"));
		assert_eq!(
			requests[2].headers.get("x-request-id").and_then(|value| value.to_str().ok()),
			Some("req-7")
		);
		assert_eq!(requests[2].headers.get(ACCEPT), Some(&HeaderValue::from_static("application/json")));

		let stored = store.snapshot().expect("Rotated pair should be stored.");

		assert_eq!(stored.access_token.expose(), "A2");
		assert_eq!(stored.refresh_token.expose(), "R2");
		assert_eq!(redirect.count(), 0);
	}

	#[tokio::test]
	async fn missing_token_fails_fast_without_network() {
		let transport = rotating_backend();
		let (client, _store, redirect) = build_scripted_client(transport.clone(), None);
		let err = client.get("/timetable").await.expect_err("Requests need a stored token.");

		assert!(matches!(err, Error::NoCredential));
		assert!(transport.requests().is_empty());
		assert_eq!(redirect.reasons(), vec![UnauthenticatedReason::NoCredential]);
	}

	#[tokio::test]
	async fn second_auth_failure_ends_the_session() {
		let transport = ScriptedTransport::new(|request| -> TransportFuture<'static> {
			Box::pin(async move {
				match request.path.as_str() {
					REFRESH_PATH => json_response(200, &token_body("A2", "R2")),
					_ => json_response(403, EXPIRED_BODY),
				}
			})
		});
		let (client, store, redirect) =
			build_scripted_client(transport.clone(), Some(CredentialPair::new("A1", "R1")));
		let err = client.get("/timetable").await.expect_err("Retry should still be rejected.");

		assert!(matches!(err, Error::UnauthorizedAfterRetry { status: 403 }));
		assert_eq!(transport.calls_to(TIMETABLE_PATH), 2);
		assert_eq!(transport.calls_to(REFRESH_PATH), 1);
		assert!(store.snapshot().is_none());
		assert_eq!(redirect.reasons(), vec![UnauthenticatedReason::UnauthorizedAfterRetry]);
	}

	#[tokio::test]
	async fn other_statuses_pass_through_untouched() {
		let transport = ScriptedTransport::new(|request| -> TransportFuture<'static> {
			Box::pin(async move {
				match request.path.as_str() {
					"/api/missing" => json_response(404, r#"{"message":"Not found."}"#),
					_ => json_response(500, r#"{"message":"Boom."}"#),
				}
			})
		});
		let (client, store, redirect) =
			build_scripted_client(transport.clone(), Some(CredentialPair::new("A1", "R1")));
		let server_error = client.get("/timetable").await.expect("500 is not a client error.");
		let not_found = client.get("/missing").await.expect("404 is not a client error.");

		assert_eq!(server_error.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
		assert_eq!(transport.calls_to(REFRESH_PATH), 0);
		assert!(store.snapshot().is_some());
		assert_eq!(redirect.count(), 0);
	}

	#[tokio::test]
	async fn concurrent_expiries_trigger_one_refresh() {
		const CALLERS: usize = 5;

		let rejected = Arc::new(AtomicUsize::new(0));
		let seen = rejected.clone();
		let transport = ScriptedTransport::new(move |request| -> TransportFuture<'static> {
			let seen = seen.clone();

			Box::pin(async move {
				match (request.path.as_str(), request.authorization.as_deref()) {
					(REFRESH_PATH, _) => {
						// Keep the exchange open until every caller has hit the expired token.
						while seen.load(Ordering::SeqCst) < CALLERS {
							tokio::task::yield_now().await;
						}

						json_response(200, &token_body("A2", "R2"))
					},
					(_, Some("bearer A2")) => json_response(200, r#"{"ok":true}"#),
					_ => {
						seen.fetch_add(1, Ordering::SeqCst);

						json_response(401, EXPIRED_BODY)
					},
				}
			})
		});
		let (client, _store, redirect) =
			build_scripted_client(transport.clone(), Some(CredentialPair::new("A1", "R1")));
		let call = || {
			let client = client.clone();

			async move { client.get("/timetable").await }
		};
		let results = tokio::join!(call(), call(), call(), call(), call());

		for result in [results.0, results.1, results.2, results.3, results.4] {
			let response = result.expect("Every caller should succeed after the shared refresh.");

			assert_eq!(response.status(), StatusCode::OK);
		}

		let retried = transport
			.requests()
			.into_iter()
			.filter(|request| {
				request.path == TIMETABLE_PATH
					&& request.authorization.as_deref() == Some("bearer A2")
			})
			.count();

		assert_eq!(transport.calls_to(REFRESH_PATH), 1);
		assert_eq!(retried, CALLERS);
		assert_eq!(client.refresh_metrics.joins(), (CALLERS - 1) as u64);
		assert_eq!(redirect.count(), 0);
	}

	#[tokio::test]
	async fn late_rejection_reuses_the_rotated_token() {
		let slow_sent = Arc::new(AtomicBool::new(false));
		let rotated = Arc::new(AtomicBool::new(false));
		let generation = Arc::new(AtomicUsize::new(1));
		let (slow_flag, rotated_flag, counter) = (slow_sent.clone(), rotated.clone(), generation);
		let transport = ScriptedTransport::new(move |request| -> TransportFuture<'static> {
			let (slow_sent, rotated) = (slow_flag.clone(), rotated_flag.clone());
			let next = match request.path.as_str() {
				REFRESH_PATH => counter.fetch_add(1, Ordering::SeqCst) + 1,
				_ => 0,
			};

			Box::pin(async move {
				match (request.path.as_str(), request.authorization.as_deref()) {
					(REFRESH_PATH, _) => json_response(
						200,
						&token_body(&format!("A{next}"), &format!("R{next}")),
					),
					(_, Some("bearer A2")) => {
						rotated.store(true, Ordering::SeqCst);

						json_response(200, r#"{"ok":true}"#)
					},
					("/api/fast", _) => {
						// Both requests leave with `A1` before the refresh starts.
						while !slow_sent.load(Ordering::SeqCst) {
							tokio::task::yield_now().await;
						}

						json_response(401, EXPIRED_BODY)
					},
					_ => {
						slow_sent.store(true, Ordering::SeqCst);

						// Answer only after the rotated token has been used once.
						while !rotated.load(Ordering::SeqCst) {
							tokio::task::yield_now().await;
						}

						json_response(401, EXPIRED_BODY)
					},
				}
			})
		});
		let (client, store, redirect) =
			build_scripted_client(transport.clone(), Some(CredentialPair::new("A1", "R1")));
		let (fast, slow) = tokio::join!(client.get("/fast"), client.get("/slow"));

		assert_eq!(fast.expect("Fast request should succeed.").status(), StatusCode::OK);
		assert_eq!(slow.expect("Slow request should succeed.").status(), StatusCode::OK);

		let trail: Vec<(String, Option<String>)> = transport
			.requests()
			.into_iter()
			.map(|request| (request.path, request.authorization))
			.collect();
		let sent = |path: &str, token: Option<&str>| (path.to_owned(), token.map(str::to_owned));

		assert_eq!(
			trail,
			[
				sent("/api/fast", Some("Bearer A1")),
				sent("/api/slow", Some("Bearer A1")),
				sent(REFRESH_PATH, None),
				sent("/api/fast", Some("bearer A2")),
				sent("/api/slow", Some("bearer A2")),
			]
		);
		assert_eq!(client.refresh_metrics.attempts(), 1);
		assert_eq!(
			store.snapshot().expect("Rotated pair should be stored.").access_token.expose(),
			"A2"
		);
		assert_eq!(redirect.count(), 0);
	}

	#[tokio::test]
	async fn failed_refresh_rejects_the_request_with_the_refresh_reason() {
		let transport = ScriptedTransport::new(|request| -> TransportFuture<'static> {
			Box::pin(async move {
				match request.path.as_str() {
					REFRESH_PATH => json_response(401, r#"{"code":"INVALID_TOKEN"}"#),
					_ => json_response(401, EXPIRED_BODY),
				}
			})
		});
		let (client, store, redirect) =
			build_scripted_client(transport.clone(), Some(CredentialPair::new("A1", "R1")));
		let err = client.get("/timetable").await.expect_err("Refresh failure should propagate.");

		assert!(err.is_session_ended());
		assert!(matches!(err, Error::RefreshFailed(_)));
		assert_eq!(transport.calls_to(TIMETABLE_PATH), 1);
		assert!(store.snapshot().is_none());
		assert_eq!(redirect.reasons(), vec![UnauthenticatedReason::RefreshFailed]);
	}

	#[test]
	fn only_401_and_403_count_as_auth_failures() {
		assert!(is_auth_failure(StatusCode::UNAUTHORIZED));
		assert!(is_auth_failure(StatusCode::FORBIDDEN));
		assert!(!is_auth_failure(StatusCode::NOT_FOUND));
		assert!(!is_auth_failure(StatusCode::INTERNAL_SERVER_ERROR));
		assert!(Attempt::First.may_refresh());
		assert!(!Attempt::Retried.may_refresh());
	}
}
