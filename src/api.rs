//! Typed calls for the timetable backend and the response shapes they decode.
//!
//! Most endpoints wrap their payload in a `{meta, data}` [`Envelope`]; the `/…/status` version
//! probes return a bare `{version}` object. Error bodies are read leniently through
//! [`ApiErrorBody`] since the backend emits several shapes (`detail` may be an object, a list of
//! validation errors, or a string).

pub mod account;
pub mod theme;
pub mod timetable;

pub use account::*;
pub use theme::*;
pub use timetable::*;

// crates.io
use http::{Method, StatusCode};
use serde::{Deserializer, de::Error as _};
use time::{
	PrimitiveDateTime,
	format_description::well_known::{Iso8601, Rfc3339},
};
// self
use crate::{
	_prelude::*,
	client::AuthClient,
	error::{DecodeError, InvalidField},
	http::{ApiResponse, HttpTransport},
};

/// Standard response wrapper.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope<T> {
	/// Response metadata; absent on some legacy routes.
	#[serde(default)]
	pub meta: Option<ResponseMeta>,
	/// Payload.
	pub data: T,
}

/// Metadata attached to enveloped responses.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ResponseMeta {
	/// Caller's user id, when the route is authenticated.
	#[serde(default)]
	pub user_id: Option<String>,
	/// Status code echoed by the backend.
	#[serde(default)]
	pub status: Option<u16>,
	/// Server timestamp of the response.
	#[serde(default, deserialize_with = "lenient_timestamp")]
	pub responded_at: Option<OffsetDateTime>,
}

/// Version marker returned by the status probes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
	/// Opaque version string; changes whenever the underlying data changes.
	pub version: String,
}

/// Error body returned on non-success statuses.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ApiErrorBody {
	/// Human-readable message.
	#[serde(default)]
	pub message: Option<String>,
	/// Machine-readable error code.
	#[serde(default)]
	pub code: Option<String>,
	/// Field marker emitted at the top level by some routes.
	#[serde(default)]
	pub invalid: Option<String>,
	/// Extra detail; `{ "invalid": "<field>" }` for form errors.
	#[serde(default)]
	pub detail: Option<serde_json::Value>,
}
impl ApiErrorBody {
	/// Reads the error body, yielding an empty value when it is not JSON.
	pub fn parse(response: &ApiResponse) -> Self {
		serde_json::from_slice(response.body()).unwrap_or_default()
	}

	/// Returns the form field the backend flagged, if any.
	pub fn invalid_field(&self) -> Option<InvalidField> {
		self.detail
			.as_ref()
			.and_then(|detail| detail.get("invalid"))
			.and_then(serde_json::Value::as_str)
			.or(self.invalid.as_deref())
			.and_then(InvalidField::from_marker)
	}

	/// Converts the body into [`Error::Api`] for `status`.
	pub fn into_error(self, status: StatusCode) -> Error {
		let message = self
			.message
			.or_else(|| self.detail.as_ref().and_then(|d| d.as_str()).map(str::to_owned))
			.unwrap_or_else(|| status.canonical_reason().unwrap_or("Unexpected status").to_owned());

		Error::Api { status: status.as_u16(), code: self.code, message }
	}
}

/// Fails with [`Error::Api`] unless `response` carries a 2xx status.
pub fn ensure_success(response: &ApiResponse) -> Result<()> {
	let status = response.status();

	if status.is_success() {
		Ok(())
	} else {
		Err(ApiErrorBody::parse(response).into_error(status))
	}
}

/// Decodes a bare JSON body, reporting the failing JSON path on mismatch.
pub fn decode_json<D>(endpoint: &str, response: &ApiResponse) -> Result<D, DecodeError>
where
	D: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut de).map_err(|source| DecodeError {
		endpoint: endpoint.to_owned(),
		status: response.status().as_u16(),
		source,
	})
}

/// Decodes an enveloped body and returns its `data`.
pub fn decode_data<D>(endpoint: &str, response: &ApiResponse) -> Result<D, DecodeError>
where
	D: DeserializeOwned,
{
	decode_json::<Envelope<D>>(endpoint, response).map(|envelope| envelope.data)
}

/// Percent-encodes an identifier for use as a single path segment.
pub(crate) fn path_segment(id: &str) -> String {
	// The form serializer writes spaces as `+`, which a path keeps literally.
	url::form_urlencoded::byte_serialize(id.as_bytes())
		.map(|chunk| if chunk == "+" { "%20" } else { chunk })
		.collect()
}

/// Accepts RFC 3339 timestamps and offset-less ISO 8601 ones, which are read as UTC.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
	D: Deserializer<'de>,
{
	let Some(raw) = Option::<String>::deserialize(deserializer)? else {
		return Ok(None);
	};

	parse_timestamp(&raw)
		.map(Some)
		.ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`")))
}

fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
	OffsetDateTime::parse(raw, &Rfc3339).ok().or_else(|| {
		PrimitiveDateTime::parse(raw, &Iso8601::DEFAULT).ok().map(PrimitiveDateTime::assume_utc)
	})
}

impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	pub(crate) async fn fetch_data<D>(&self, target: &str) -> Result<D>
	where
		D: DeserializeOwned,
	{
		let response = self.get(target).await?;

		ensure_success(&response)?;

		Ok(decode_data(target, &response)?)
	}

	pub(crate) async fn fetch_version(&self, target: &str) -> Result<Version> {
		let response = self.get(target).await?;

		ensure_success(&response)?;

		Ok(decode_json(target, &response)?)
	}

	pub(crate) async fn send_data<B, D>(&self, method: Method, target: &str, body: &B) -> Result<D>
	where
		B: ?Sized + Serialize,
		D: DeserializeOwned,
	{
		let response = self.send_json(method, target, body).await?;

		ensure_success(&response)?;

		Ok(decode_data(target, &response)?)
	}

	pub(crate) async fn send_unit<B>(&self, method: Method, target: &str, body: &B) -> Result<()>
	where
		B: ?Sized + Serialize,
	{
		ensure_success(&self.send_json(method, target, body).await?)
	}
}
