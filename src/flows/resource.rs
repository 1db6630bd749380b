//! Protected resource access, session inspection, and logout.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, SessionId},
	flows::{
		LoginFlow, observe,
		state::{self, FlowEvent, FlowState},
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	resource::{CalendarEvent, UserInfo},
};

/// Everything the dashboard page shows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
	/// Signed-in user's profile.
	pub user: UserInfo,
	/// Events of the primary calendar.
	pub events: Vec<CalendarEvent>,
}
impl Dashboard {
	/// Plain-text rendering: a greeting followed by one line per event.
	pub fn render(&self) -> String {
		let mut out = format!("Welcome {}\n", self.user.display_name());

		if self.events.is_empty() {
			out.push_str("\nNo upcoming events.\n");

			return out;
		}

		out.push_str("\nUpcoming events:\n");

		for event in &self.events {
			out.push_str(&format!("- {} ({} - {})\n", event.title(), event.start, event.end));
		}

		out
	}
}

impl LoginFlow {
	/// Fetches the signed-in user's profile.
	pub async fn user_info(&self, session: &SessionId) -> Result<UserInfo> {
		const KIND: FlowKind = FlowKind::Resource;

		let span = FlowSpan::new(KIND, "user_info");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let token = self.authorized_token(session).await?;
				let result = self.resources.user_info(&token).await;

				self.settle(session, &token, result).await
			})
			.await;

		observe(KIND, &result);

		result
	}

	/// Lists the signed-in user's calendar events.
	pub async fn calendar_events(&self, session: &SessionId) -> Result<Vec<CalendarEvent>> {
		const KIND: FlowKind = FlowKind::Resource;

		let span = FlowSpan::new(KIND, "calendar_events");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let token = self.authorized_token(session).await?;
				let result = self.resources.calendar_events(&token).await;

				self.settle(session, &token, result).await
			})
			.await;

		observe(KIND, &result);

		result
	}

	/// Fetches the profile and calendar events with one token lookup.
	pub async fn dashboard(&self, session: &SessionId) -> Result<Dashboard> {
		const KIND: FlowKind = FlowKind::Resource;

		let span = FlowSpan::new(KIND, "dashboard");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let token = self.authorized_token(session).await?;
				let user = self.resources.user_info(&token).await;
				let user = self.settle(session, &token, user).await?;
				let events = self.resources.calendar_events(&token).await;
				let events = self.settle(session, &token, events).await?;

				Ok(Dashboard { user, events })
			})
			.await;

		observe(KIND, &result);

		result
	}

	/// Persisted login state of `session`.
	pub async fn session_state(&self, session: &SessionId) -> Result<FlowState> {
		let record = self.store.load(session).await?;

		Ok(FlowState::of(record.as_ref(), OffsetDateTime::now_utc(), self.state_ttl))
	}

	/// Forgets everything about `session`.
	pub async fn logout(&self, session: &SessionId) -> Result<()> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let lease = self.lease(session);
				let _held = lease.guard.lock().await;
				let removed = self.store.remove(session).await?;
				let before = FlowState::of(
					removed.as_ref(),
					OffsetDateTime::now_utc(),
					self.state_ttl,
				);

				state::transition(before, FlowEvent::LoggedOut);

				Ok(())
			})
			.await;

		observe(KIND, &result);

		result
	}

	/// Returns the session's token, revoking it first if it already expired locally.
	async fn authorized_token(&self, session: &SessionId) -> Result<AccessToken> {
		let token = self.store.get_token(session).await?.ok_or(Error::NotAuthenticated)?;

		if token.is_expired_at(OffsetDateTime::now_utc()) {
			self.expire(session, &token).await?;

			return Err(Error::CredentialExpired);
		}

		Ok(token)
	}

	/// Revokes `token` when the resource server rejected it; passes every result through.
	async fn settle<T>(
		&self,
		session: &SessionId,
		token: &AccessToken,
		result: Result<T>,
	) -> Result<T> {
		let event = match &result {
			Ok(_) => FlowEvent::ResourceFetched,
			Err(e) => FlowEvent::for_resource_error(e),
		};

		if event == FlowEvent::CredentialExpired {
			self.expire(session, token).await?;
		}

		state::transition(FlowState::Authenticated, event);

		result
	}

	/// Detaches `token` from the session unless a newer login already replaced it.
	async fn expire(&self, session: &SessionId, token: &AccessToken) -> Result<()> {
		let lease = self.lease(session);
		let _held = lease.guard.lock().await;
		let current = self.store.get_token(session).await?;

		if current.is_some_and(|current| current.access_token == token.access_token) {
			self.store.revoke_token(session).await?;
			self.metrics.record_credential_expired();
		}

		Ok(())
	}
}
