//! Login flow orchestration: authorization URL, callback handling, and token use.
//!
//! [`LoginFlow`] owns the process-wide credentials plus the injected store, exchanger, and
//! resource client. Operations on the same session are serialized through a per-session async
//! guard so a read-validate-clear or exchange-store sequence never interleaves with another
//! request carrying the same cookie. Distinct sessions never contend.

pub mod authorize;
pub mod login;
pub mod resource;
pub mod state;

pub use authorize::*;
pub use login::*;
pub use resource::*;
pub use state::*;

// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_STATE_TTL, SessionId},
	config::{AppConfig, OAuthCredentials},
	http,
	oauth::{OAuth2Exchanger, TokenExchanger},
	obs::{self, FlowKind, FlowMetrics, FlowOutcome},
	resource::{ReqwestResourceClient, ResourceFetcher},
	store::SessionStore,
};

type GuardMap = Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>;

/// Sequences the browser login against one provider.
#[derive(Clone)]
pub struct LoginFlow {
	credentials: Arc<OAuthCredentials>,
	store: Arc<dyn SessionStore>,
	exchanger: Arc<dyn TokenExchanger>,
	resources: Arc<dyn ResourceFetcher>,
	state_ttl: Duration,
	metrics: Arc<FlowMetrics>,
	session_guards: Arc<GuardMap>,
}
impl LoginFlow {
	/// Wires a flow from explicit collaborators.
	pub fn new(
		credentials: impl Into<Arc<OAuthCredentials>>,
		store: Arc<dyn SessionStore>,
		exchanger: Arc<dyn TokenExchanger>,
		resources: Arc<dyn ResourceFetcher>,
	) -> Self {
		Self {
			credentials: credentials.into(),
			store,
			exchanger,
			resources,
			state_ttl: DEFAULT_STATE_TTL,
			metrics: Default::default(),
			session_guards: Default::default(),
		}
	}

	/// Wires the reqwest-backed exchanger and resource client from startup configuration.
	pub fn from_config(config: &AppConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
		let client = http::default_client()?;
		let exchanger = OAuth2Exchanger::reqwest(&config.credentials, client.clone())?;
		let resources = ReqwestResourceClient::new(client, config.resources.clone());

		Ok(Self::new(
			config.credentials.clone(),
			store,
			Arc::new(exchanger),
			Arc::new(resources),
		)
		.with_state_ttl(config.server.state_ttl))
	}

	/// Overrides how long a pending authorization stays acceptable.
	pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
		self.state_ttl = ttl;

		self
	}

	/// Client registration used by this flow.
	pub fn credentials(&self) -> &OAuthCredentials {
		&self.credentials
	}

	/// In-process counters for this flow.
	pub fn metrics(&self) -> &FlowMetrics {
		&self.metrics
	}

	/// Session storage backing this flow.
	pub fn store(&self) -> &dyn SessionStore {
		self.store.as_ref()
	}

	/// Takes the session's guard; dropping the lease prunes the guard once nobody else holds it.
	fn lease<'a>(&'a self, session: &'a SessionId) -> GuardLease<'a> {
		let guard = self
			.session_guards
			.lock()
			.entry(session.clone())
			.or_insert_with(|| Arc::new(AsyncMutex::new(())))
			.clone();

		GuardLease { guards: &self.session_guards, session, guard }
	}
}
impl Debug for LoginFlow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginFlow")
			.field("client_id", &self.credentials.client_id)
			.field("authorization_endpoint", &self.credentials.endpoints.authorization.as_str())
			.field("state_ttl", &self.state_ttl)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}

struct GuardLease<'a> {
	guards: &'a GuardMap,
	session: &'a SessionId,
	guard: Arc<AsyncMutex<()>>,
}
impl Drop for GuardLease<'_> {
	fn drop(&mut self) {
		let mut guards = self.guards.lock();

		// One reference in the map, one here.
		if Arc::strong_count(&self.guard) == 2 {
			guards.remove(self.session);
		}
	}
}

/// Records the terminal outcome of a flow operation.
fn observe<T>(kind: FlowKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(err) => {
			obs::record_flow_outcome(kind, FlowOutcome::Failure);
			obs::record_flow_failure(kind, err);
			obs::record_flow_error(kind, err);
		},
	}
}
