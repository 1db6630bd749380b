//! Login initiation and callback handling.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, PendingAuthorization, SessionId, validate_state},
	flows::{
		LoginFlow, authorize,
		authorize::AuthorizationRequest,
		observe,
		state::{self, FlowEvent, FlowState},
	},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const MAX_OAUTH_ERROR_LEN: usize = 64;

/// Query parameters the provider appends to the redirect URL.
#[derive(Clone, Default, Deserialize)]
pub struct CallbackParams {
	/// Anti-forgery value echoed back by the provider.
	pub state: Option<String>,
	/// One-time authorization code.
	pub code: Option<String>,
	/// OAuth error code when the user or provider refused the request.
	pub error: Option<String>,
}
impl Debug for CallbackParams {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackParams")
			.field("state_present", &self.state.is_some())
			.field("code_present", &self.code.is_some())
			.field("error", &self.error)
			.finish()
	}
}

impl LoginFlow {
	/// Starts a login attempt for `session` and returns the authorization URL to redirect to.
	///
	/// A previous pending attempt of the same session is replaced.
	pub async fn initiate_login(&self, session: &SessionId) -> Result<AuthorizationRequest> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "initiate_login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let lease = self.lease(session);
				let _held = lease.guard.lock().await;
				let now = OffsetDateTime::now_utc();
				let record = self.store.load(session).await?;
				let before = FlowState::of(record.as_ref(), now, self.state_ttl);
				let pending = PendingAuthorization::generate(now);
				let request = authorize::build_authorization_url(&self.credentials, &pending);

				self.store.save_pending(session, pending).await?;
				self.metrics.record_login_started();
				state::transition(before, FlowEvent::LoginInitiated);

				Ok(request)
			})
			.await;

		observe(KIND, &result);

		result
	}

	/// Completes a login from the provider redirect.
	///
	/// Steps run strictly in order: validate `state` against the session's pending attempt,
	/// consume that attempt, honor a provider `error`, require a `code`, exchange it, and store
	/// the token. A failure at any step leaves the session without a new token and never
	/// reaches the later steps.
	pub async fn handle_callback(
		&self,
		session: &SessionId,
		params: CallbackParams,
	) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::Callback;

		let span = FlowSpan::new(KIND, "handle_callback");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let lease = self.lease(session);
				let _held = lease.guard.lock().await;

				self.complete_callback(session, params).await
			})
			.await;

		match &result {
			Ok(_) => {
				self.metrics.record_callback_accepted();
				state::transition(FlowState::AwaitingCallback, FlowEvent::CallbackAccepted);
			},
			Err(_) => {
				self.metrics.record_callback_rejected();
				state::transition(FlowState::AwaitingCallback, FlowEvent::CallbackRejected);
			},
		}

		observe(KIND, &result);

		result
	}

	async fn complete_callback(
		&self,
		session: &SessionId,
		params: CallbackParams,
	) -> Result<AccessToken> {
		let now = OffsetDateTime::now_utc();
		let record = self.store.load(session).await?;
		let pending = record.as_ref().and_then(|record| record.pending.as_ref());

		if let Err(e) = validate_state(pending, params.state.as_deref(), now, self.state_ttl) {
			if pending.is_some_and(|p| p.is_expired_at(now, self.state_ttl)) {
				self.store.clear_pending(session).await?;
			}

			return Err(e);
		}

		let pending = self.store.clear_pending(session).await?.ok_or(Error::StateMismatch)?;

		if let Some(error) = params.error {
			return Err(Error::AuthorizationDenied { error: sanitize_oauth_error(&error) });
		}

		let code = params.code.filter(|code| !code.is_empty()).ok_or(Error::MissingCode)?;

		self.metrics.record_exchange_attempt();

		let token = self.exchanger.exchange(&code, &pending.pkce_verifier).await?;

		self.store.put_token(session, token.clone()).await?;

		Ok(token)
	}
}

/// Keeps provider-supplied error codes to the RFC 6749 character set and a bounded length.
fn sanitize_oauth_error(raw: &str) -> String {
	if !raw.is_empty()
		&& raw.len() <= MAX_OAUTH_ERROR_LEN
		&& raw.bytes().all(|b| b.is_ascii_lowercase() || b == b'_')
	{
		raw.to_owned()
	} else {
		"unknown".into()
	}
}
