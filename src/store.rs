//! Per-session storage contracts and the built-in in-memory store.

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, PendingAuthorization, SessionId},
};

/// Boxed future returned by [`SessionStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for browser session records.
///
/// Each method is atomic on its own. Callers that need read-then-write sequences serialize them
/// per session.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Fetches the whole record for a session, if one exists.
	fn load<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<SessionRecord>>;

	/// Records a new login attempt, replacing any previous pending attempt.
	fn save_pending<'a>(
		&'a self,
		session: &'a SessionId,
		pending: PendingAuthorization,
	) -> StoreFuture<'a, ()>;

	/// Removes and returns the pending attempt, leaving any token untouched.
	fn clear_pending<'a>(
		&'a self,
		session: &'a SessionId,
	) -> StoreFuture<'a, Option<PendingAuthorization>>;

	/// Attaches a freshly exchanged token to the session.
	fn put_token<'a>(&'a self, session: &'a SessionId, token: AccessToken)
	-> StoreFuture<'a, ()>;

	/// Returns the session's token, if present.
	fn get_token<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<AccessToken>> {
		Box::pin(async move { Ok(self.load(session).await?.and_then(|record| record.token)) })
	}

	/// Detaches and returns the session's token.
	fn revoke_token<'a>(&'a self, session: &'a SessionId)
	-> StoreFuture<'a, Option<AccessToken>>;

	/// Deletes the whole session record.
	fn remove<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<SessionRecord>>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Everything the server remembers about one browser session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
	/// Login attempt awaiting its callback.
	pub pending: Option<PendingAuthorization>,
	/// Token granted by the last successful exchange.
	pub token: Option<AccessToken>,
	/// Instant of the first write for this session.
	pub created_at: OffsetDateTime,
	/// Instant of the most recent write.
	pub updated_at: OffsetDateTime,
}
impl SessionRecord {
	/// Creates an empty record stamped at `now`.
	pub fn new(now: OffsetDateTime) -> Self {
		Self { pending: None, token: None, created_at: now, updated_at: now }
	}

	/// Returns `true` when the record holds a token that has not expired at `now`.
	pub fn is_authenticated_at(&self, now: OffsetDateTime) -> bool {
		self.token.as_ref().is_some_and(|token| !token.is_expired_at(now))
	}

	/// Updates the modification stamp.
	pub fn touch(&mut self, now: OffsetDateTime) {
		self.updated_at = now;
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::ScopeSet;

	#[test]
	fn store_error_converts_into_flow_error() {
		let store_error = StoreError::Backend { message: "lock poisoned".into() };
		let err: Error = store_error.into();

		assert!(matches!(err, Error::Storage(_)));
		assert_eq!(err.kind(), "storage");
	}

	#[test]
	fn authentication_depends_on_token_expiry() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let mut record = SessionRecord::new(now);

		assert!(!record.is_authenticated_at(now));

		record.token = Some(
			AccessToken::builder(ScopeSet::default())
				.access_token("ya29.token")
				.issued_at(now)
				.expires_in(Duration::hours(1))
				.build()
				.expect("Token fixture should build."),
		);

		assert!(record.is_authenticated_at(now + Duration::minutes(59)));
		assert!(!record.is_authenticated_at(now + Duration::hours(1)));
	}
}
