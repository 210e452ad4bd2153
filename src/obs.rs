//! Optional observability helpers for client calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `timetable_client.call` with the `call`
//!   (operation) and `stage` (call site) fields. Authorized requests also fill in `status` with
//!   the last HTTP status they received. Debug and warn events mark refreshes and session
//!   endings.
//! - Enable `metrics` to increment `timetable_client_call_total{call, outcome}` for every
//!   attempt/success/failure and `timetable_client_response_total{call, class}` for every
//!   response status class (`2xx`, `4xx`, ...).

// self
use crate::_prelude::*;

/// Future returned by [`CallSpan::instrument`]; instrumented only when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`CallSpan::instrument`]; instrumented only when tracing is enabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// Emits a `tracing` event when the feature is enabled; expands to nothing otherwise.
macro_rules! trace_event {
	($level:ident, $($arg:tt)+) => {
		#[cfg(feature = "tracing")]
		{
			::tracing::$level!($($arg)+);
		}
	};
}
pub(crate) use trace_event;

/// Client operations observed by the instrumentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Authorized request through [`AuthClient::request`](crate::client::AuthClient::request).
	Request,
	/// Token refresh exchange.
	Refresh,
	/// Credential login.
	Login,
	/// Account signup.
	Signup,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Request => "request",
			CallKind::Refresh => "refresh",
			CallKind::Login => "login",
			CallKind::Signup => "signup",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a client operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Collapses a status code into its class label (`1xx` through `5xx`).
pub const fn status_class(status: u16) -> &'static str {
	match status / 100 {
		1 => "1xx",
		2 => "2xx",
		3 => "3xx",
		4 => "4xx",
		_ => "5xx",
	}
}

/// Span wrapping one client operation.
#[derive(Clone, Debug)]
pub struct CallSpan {
	kind: CallKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Opens a span for `kind` at the named call site.
	pub fn new(kind: CallKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"timetable_client.call",
				call = kind.as_str(),
				stage,
				status = tracing::field::Empty
			);

			Self { kind, span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self { kind }
		}
	}

	/// Records a received HTTP status on the span and in the response counter.
	pub fn observe_status(&self, status: u16) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("status", status);
		}
		#[cfg(feature = "metrics")]
		{
			metrics::counter!(
				"timetable_client_response_total",
				"call" => self.kind.as_str(),
				"class" => status_class(status)
			)
			.increment(1);
		}
		#[cfg(not(feature = "metrics"))]
		{
			let _ = (self.kind, status);
		}
	}

	/// Instruments `fut` without holding a span guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Counts a call outcome through the global metrics recorder when `metrics` is enabled.
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"timetable_client_call_total",
			"call" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}
