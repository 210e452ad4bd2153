//! Transport primitives for API calls.
//!
//! The client depends on an HTTP stack only through [`HttpTransport`]. Requests and responses
//! are plain [`http`] types with buffered bodies, so custom transports (or scripted ones in
//! tests) only need to turn an [`ApiRequest`] into an [`ApiResponse`].

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// self
use crate::{_prelude::*, error::TransportError};

/// Outgoing request with a buffered body.
pub type ApiRequest = http::Request<Vec<u8>>;
/// Incoming response with a buffered body.
pub type ApiResponse = http::Response<Vec<u8>>;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to execute a single request.
///
/// Implementations must return every HTTP status as `Ok`; only failures that prevent a
/// response from arriving (DNS, TCP, TLS, body read) are `Err`. Status interpretation belongs
/// to the client.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the response.
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Copies method, URI, version, headers, and body; extensions are not carried over.
pub(crate) fn duplicate_request(request: &ApiRequest) -> ApiRequest {
	let mut copy = ApiRequest::new(request.body().clone());

	*copy.method_mut() = request.method().clone();
	*copy.uri_mut() = request.uri().clone();
	*copy.version_mut() = request.version();
	*copy.headers_mut() = request.headers().clone();

	copy
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Configure timeouts, proxies, or TLS roots on the wrapped client; the auth client itself
/// never cancels requests.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let version = response.version();
			let mut response_new = ApiResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;
			*response_new.version_mut() = version;

			Ok(response_new)
		})
	}
}
