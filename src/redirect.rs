//! Hook invoked when the session ends and the user has to sign in again.
//!
//! A browser front-end would navigate to its login page here; services and CLIs typically
//! surface a prompt or drop cached state. The hook runs after credentials are cleared and
//! before the error is returned to the caller.

// self
use crate::_prelude::*;

/// Why the client gave up on the current session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnauthenticatedReason {
	/// No access token was stored when a request was attempted.
	NoCredential,
	/// The refresh endpoint rejected the refresh token or could not be reached.
	RefreshFailed,
	/// The retried request was still rejected after a successful refresh.
	UnauthorizedAfterRetry,
}
impl UnauthenticatedReason {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NoCredential => "no_credential",
			Self::RefreshFailed => "refresh_failed",
			Self::UnauthorizedAfterRetry => "unauthorized_after_retry",
		}
	}
}
impl Display for UnauthenticatedReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Receives "go to login" notifications from the client.
pub trait LoginRedirect
where
	Self: Send + Sync,
{
	/// Sends the user to `login_entry_point`.
	fn redirect_to_login(&self, login_entry_point: &str, reason: UnauthenticatedReason);
}

/// Redirect hook that does nothing; the returned error is the only signal.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRedirect;
impl LoginRedirect for NoopRedirect {
	fn redirect_to_login(&self, _login_entry_point: &str, _reason: UnauthenticatedReason) {}
}

/// Adapts a closure into a [`LoginRedirect`].
pub struct FnRedirect<F>(pub F);
impl<F> LoginRedirect for FnRedirect<F>
where
	F: Fn(&str, UnauthenticatedReason) + Send + Sync,
{
	fn redirect_to_login(&self, login_entry_point: &str, reason: UnauthenticatedReason) {
		(self.0)(login_entry_point, reason)
	}
}
impl<F> Debug for FnRedirect<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FnRedirect(..)")
	}
}
