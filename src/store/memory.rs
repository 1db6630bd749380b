//! Thread-safe in-memory [`SessionStore`] implementation.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, PendingAuthorization, SessionId},
	store::{SessionRecord, SessionStore, StoreFuture},
};

type SessionMap = Arc<RwLock<HashMap<SessionId, SessionRecord>>>;

/// Process-local session storage; contents are lost on restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SessionMap);
impl MemoryStore {
	/// Number of sessions currently tracked.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no session is tracked.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn upsert_now<T>(
		map: SessionMap,
		session: &SessionId,
		apply: impl FnOnce(&mut SessionRecord) -> T,
	) -> T {
		let now = OffsetDateTime::now_utc();
		let mut guard = map.write();
		let record = guard.entry(session.clone()).or_insert_with(|| SessionRecord::new(now));
		let out = apply(record);

		record.touch(now);

		out
	}

	fn update_now<T>(
		map: SessionMap,
		session: &SessionId,
		apply: impl FnOnce(&mut SessionRecord) -> Option<T>,
	) -> Option<T> {
		let mut guard = map.write();
		let record = guard.get_mut(session)?;
		let out = apply(record);

		if out.is_some() {
			record.touch(OffsetDateTime::now_utc());
		}

		out
	}
}
impl SessionStore for MemoryStore {
	fn load<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<SessionRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(session).cloned()) })
	}

	fn save_pending<'a>(
		&'a self,
		session: &'a SessionId,
		pending: PendingAuthorization,
	) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			Self::upsert_now(map, session, |record| record.pending = Some(pending));

			Ok(())
		})
	}

	fn clear_pending<'a>(
		&'a self,
		session: &'a SessionId,
	) -> StoreFuture<'a, Option<PendingAuthorization>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::update_now(map, session, |record| record.pending.take())) })
	}

	fn put_token<'a>(
		&'a self,
		session: &'a SessionId,
		token: AccessToken,
	) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			Self::upsert_now(map, session, |record| record.token = Some(token));

			Ok(())
		})
	}

	fn revoke_token<'a>(
		&'a self,
		session: &'a SessionId,
	) -> StoreFuture<'a, Option<AccessToken>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::update_now(map, session, |record| record.token.take())) })
	}

	fn remove<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<SessionRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(session)) })
	}
}
