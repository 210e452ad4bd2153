//! Credential models: the stored token pair and the redacted secret wrapper.

pub mod credential;
pub mod secret;

pub use credential::*;
pub use secret::*;
