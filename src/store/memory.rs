//! Thread-safe in-memory [`CredentialStore`] for tests, demos, and short-lived processes.

// self
use crate::{
	_prelude::*,
	auth::CredentialPair,
	store::{CredentialStore, StoreFuture},
};

/// Keeps the credential pair in process memory; clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<Option<CredentialPair>>>);
impl MemoryStore {
	/// Creates a store seeded with `credentials`.
	pub fn with_credentials(credentials: CredentialPair) -> Self {
		Self(Arc::new(RwLock::new(Some(credentials))))
	}

	/// Returns the current pair without going through the async contract.
	pub fn snapshot(&self) -> Option<CredentialPair> {
		self.0.read().clone()
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<CredentialPair>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn save(&self, credentials: CredentialPair) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(credentials);

			Ok(())
		})
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn save_replaces_and_clear_empties() {
		let store = MemoryStore::with_credentials(CredentialPair::new("A1", "R1"));
		let shared = store.clone();

		store
			.save(CredentialPair::new("A2", "R2"))
			.await
			.expect("Saving into the memory store should succeed.");

		let loaded = shared
			.load()
			.await
			.expect("Loading from the memory store should succeed.")
			.expect("Saved pair should be visible through clones.");

		assert_eq!(loaded.access_token.expose(), "A2");
		assert_eq!(loaded.refresh_token.expose(), "R2");

		store.clear().await.expect("Clearing the memory store should succeed.");
		store.clear().await.expect("Clearing an empty memory store should succeed.");

		assert!(shared.snapshot().is_none());
	}
}
