//! Login state machine.
//!
//! ```text
//! Anonymous --LoginInitiated--> AwaitingCallback --CallbackAccepted--> Authenticated
//! Authenticated --ResourceFetched--> ResourceFetched
//! Authenticated | ResourceFetched --CredentialExpired--> Anonymous
//! any other failure --> Failed (absorbing for the current request)
//! ```
//!
//! Only `Anonymous`, `AwaitingCallback`, and `Authenticated` are persisted through the session
//! record. `ResourceFetched` and `Failed` describe the outcome of a single request.

// self
use crate::{_prelude::*, store::SessionRecord};

/// Where a browser session stands in the login.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowState {
	/// No live login attempt and no usable token.
	Anonymous,
	/// Authorization URL issued; waiting for the provider callback.
	AwaitingCallback,
	/// Token stored for the session.
	Authenticated,
	/// A protected resource was fetched with the stored token.
	ResourceFetched,
	/// The current request failed; a new request starts again from the persisted state.
	Failed,
}
impl FlowState {
	/// Derives the persisted state of a session at `now`.
	pub fn of(record: Option<&SessionRecord>, now: OffsetDateTime, state_ttl: Duration) -> Self {
		let Some(record) = record else {
			return Self::Anonymous;
		};

		if record.is_authenticated_at(now) {
			Self::Authenticated
		} else if record.pending.as_ref().is_some_and(|p| !p.is_expired_at(now, state_ttl)) {
			Self::AwaitingCallback
		} else {
			Self::Anonymous
		}
	}

	/// Applies `event`. Events that make no sense in the current state lead to `Failed`.
	pub fn on(self, event: FlowEvent) -> Self {
		match (self, event) {
			(Self::Failed, _) => Self::Failed,
			(_, FlowEvent::LoggedOut) => Self::Anonymous,
			(_, FlowEvent::LoginInitiated) => Self::AwaitingCallback,
			(Self::AwaitingCallback, FlowEvent::CallbackAccepted) => Self::Authenticated,
			(Self::Authenticated | Self::ResourceFetched, FlowEvent::ResourceFetched) =>
				Self::ResourceFetched,
			(Self::Authenticated | Self::ResourceFetched, FlowEvent::CredentialExpired) =>
				Self::Anonymous,
			_ => Self::Failed,
		}
	}

	/// Returns `true` when a token is attached to the session.
	pub fn is_authenticated(self) -> bool {
		matches!(self, Self::Authenticated | Self::ResourceFetched)
	}
}
impl Display for FlowState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(match self {
			Self::Anonymous => "anonymous",
			Self::AwaitingCallback => "awaiting_callback",
			Self::Authenticated => "authenticated",
			Self::ResourceFetched => "resource_fetched",
			Self::Failed => "failed",
		})
	}
}

/// Inputs that move a session between [`FlowState`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowEvent {
	/// A fresh authorization URL was issued.
	LoginInitiated,
	/// State validated, code exchanged, and token stored.
	CallbackAccepted,
	/// Any callback failure.
	CallbackRejected,
	/// A protected resource call succeeded.
	ResourceFetched,
	/// The token expired locally or a resource server rejected it.
	CredentialExpired,
	/// A protected resource call failed for another reason.
	ResourceFailed,
	/// The session was cleared.
	LoggedOut,
}
impl FlowEvent {
	/// Event produced by a failed resource call.
	pub fn for_resource_error(err: &Error) -> Self {
		if matches!(err, Error::CredentialExpired) {
			Self::CredentialExpired
		} else {
			Self::ResourceFailed
		}
	}
}

/// Applies `event` to `from` and logs the transition at debug level.
pub(crate) fn transition(from: FlowState, event: FlowEvent) -> FlowState {
	let to = from.on(event);

	#[cfg(feature = "tracing")]
	tracing::debug!(from = %from, to = %to, ?event, "Flow transition.");

	to
}
