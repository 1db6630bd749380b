#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
// self
use oauth2_calendar::{
	auth::{AccessToken, PendingAuthorization, PkceVerifier, ScopeSet, SessionId},
	config::OAuthCredentials,
	error::{Error, ExchangeError, Result, TransportError},
	flows::{CallbackParams, LoginFlow},
	oauth::{ExchangeFuture, TokenExchanger},
	resource::{CalendarEvent, EventTime, ResourceFetcher, ResourceFuture, UserInfo},
	store::{MemoryStore, SessionRecord, SessionStore, StoreError, StoreFuture},
};

pub const CLIENT_ID: &str = "client-it";
pub const CLIENT_SECRET: &str = "secret-it";

pub fn credentials() -> OAuthCredentials {
	OAuthCredentials::builder(CLIENT_ID, CLIENT_SECRET)
		.redirect_url("http://localhost:8080/callback")
		.build()
		.expect("Test credentials should validate.")
}

pub fn token(value: &str, expires_in: Duration) -> AccessToken {
	AccessToken::builder(ScopeSet::default())
		.access_token(value)
		.issued_at(OffsetDateTime::now_utc())
		.expires_in(expires_in)
		.build()
		.expect("Test token should build.")
}

pub fn standup() -> CalendarEvent {
	CalendarEvent {
		summary: Some("Standup".into()),
		start: EventTime { date_time: Some("2025-03-03T09:00:00Z".into()), ..Default::default() },
		end: EventTime { date_time: Some("2025-03-03T09:15:00Z".into()), ..Default::default() },
		..Default::default()
	}
}

/// Callback parameters echoing `state` with `code`.
pub fn callback(state: &str, code: &str) -> CallbackParams {
	CallbackParams { state: Some(state.into()), code: Some(code.into()), error: None }
}

/// State value embedded in an authorization URL.
pub fn state_of(url: &url::Url) -> String {
	url.query_pairs()
		.find(|(k, _)| k == "state")
		.map(|(_, v)| v.into_owned())
		.expect("Authorization URL should carry a state parameter.")
}

/// Exchanger returning a fixed token and counting its calls.
#[derive(Default)]
pub struct CountingExchanger {
	calls: AtomicUsize,
	codes: Mutex<Vec<String>>,
	failure: Option<fn() -> Error>,
}
impl CountingExchanger {
	/// Every exchange fails with the error built by `failure`.
	pub fn failing(failure: fn() -> Error) -> Self {
		Self { failure: Some(failure), ..Default::default() }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn codes(&self) -> Vec<String> {
		self.codes.lock().clone()
	}
}
impl TokenExchanger for CountingExchanger {
	fn exchange<'a>(&'a self, code: &'a str, verifier: &'a PkceVerifier) -> ExchangeFuture<'a> {
		Box::pin(async move {
			assert!(!verifier.secret().is_empty(), "Exchange must receive the PKCE verifier.");

			let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

			self.codes.lock().push(code.to_owned());

			if let Some(failure) = self.failure {
				return Err(failure());
			}

			Ok(token(&format!("access-{n}"), Duration::hours(1)))
		})
	}
}

pub fn code_rejected() -> Error {
	ExchangeError::CodeRejected { oauth_error: Some("invalid_grant".into()), status: Some(400) }
		.into()
}

pub fn unreachable() -> Error {
	TransportError::Timeout { target: "token endpoint" }.into()
}

/// Resource fetcher with canned answers.
pub struct StubResources {
	user: UserInfo,
	events: Vec<CalendarEvent>,
	reject: bool,
	tokens_seen: Mutex<Vec<String>>,
}
impl StubResources {
	pub fn new(name: &str, events: Vec<CalendarEvent>) -> Self {
		Self {
			user: UserInfo { name: Some(name.into()), ..Default::default() },
			events,
			reject: false,
			tokens_seen: Default::default(),
		}
	}

	/// Every call answers as if the resource server returned `401`.
	pub fn rejecting() -> Self {
		Self { reject: true, ..Self::new("nobody", Vec::new()) }
	}

	pub fn tokens_seen(&self) -> Vec<String> {
		self.tokens_seen.lock().clone()
	}

	fn answer<T>(&self, token: &AccessToken, value: T) -> Result<T> {
		self.tokens_seen.lock().push(token.access_token.expose().to_owned());

		if self.reject { Err(Error::CredentialExpired) } else { Ok(value) }
	}
}
impl ResourceFetcher for StubResources {
	fn user_info<'a>(&'a self, token: &'a AccessToken) -> ResourceFuture<'a, UserInfo> {
		Box::pin(async move { self.answer(token, self.user.clone()) })
	}

	fn calendar_events<'a>(
		&'a self,
		token: &'a AccessToken,
	) -> ResourceFuture<'a, Vec<CalendarEvent>> {
		Box::pin(async move { self.answer(token, self.events.clone()) })
	}
}

/// Memory store whose `put_token` always fails.
#[derive(Default)]
pub struct FailingTokenStore(MemoryStore);
impl SessionStore for FailingTokenStore {
	fn load<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<SessionRecord>> {
		self.0.load(session)
	}

	fn save_pending<'a>(
		&'a self,
		session: &'a SessionId,
		pending: PendingAuthorization,
	) -> StoreFuture<'a, ()> {
		self.0.save_pending(session, pending)
	}

	fn clear_pending<'a>(
		&'a self,
		session: &'a SessionId,
	) -> StoreFuture<'a, Option<PendingAuthorization>> {
		self.0.clear_pending(session)
	}

	fn put_token<'a>(
		&'a self,
		_session: &'a SessionId,
		_token: AccessToken,
	) -> StoreFuture<'a, ()> {
		Box::pin(async { Err(StoreError::Backend { message: "disk full".into() }) })
	}

	fn revoke_token<'a>(
		&'a self,
		session: &'a SessionId,
	) -> StoreFuture<'a, Option<AccessToken>> {
		self.0.revoke_token(session)
	}

	fn remove<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<SessionRecord>> {
		self.0.remove(session)
	}
}

/// Flow over a memory store with test doubles for the exchanger and resources.
pub struct Harness {
	pub flow: LoginFlow,
	pub store: Arc<MemoryStore>,
	pub exchanger: Arc<CountingExchanger>,
	pub resources: Arc<StubResources>,
}
impl Harness {
	pub fn new(exchanger: CountingExchanger, resources: StubResources) -> Self {
		let store = Arc::new(MemoryStore::default());
		let exchanger = Arc::new(exchanger);
		let resources = Arc::new(resources);
		let flow = LoginFlow::new(
			credentials(),
			store.clone(),
			exchanger.clone(),
			resources.clone(),
		);

		Self { flow, store, exchanger, resources }
	}

	pub fn standard() -> Self {
		Self::new(CountingExchanger::default(), StubResources::new("Ada", vec![standup()]))
	}

	/// Runs a full login for `session` and returns the stored token.
	pub async fn sign_in(&self, session: &SessionId) -> AccessToken {
		let request =
			self.flow.initiate_login(session).await.expect("Login should start for the session.");

		self.flow
			.handle_callback(session, callback(request.state.as_str(), "code-ok"))
			.await
			.expect("Callback with the issued state should succeed.")
	}
}
