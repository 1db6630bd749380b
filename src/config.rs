//! Startup configuration: OAuth client credentials, resource endpoints, and server settings.
//!
//! Everything here is validated once before the server accepts traffic; a bad value aborts
//! startup with a [`ConfigError`] instead of failing individual requests later.

// std
use std::net::SocketAddr;
// crates.io
use url::Host;
// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_STATE_TTL, ScopeSet, TokenSecret},
	error::ConfigError,
};

/// Google's authorization endpoint.
pub const GOOGLE_AUTHORIZATION_URL: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google's token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Google's OAuth2 user-info endpoint.
pub const GOOGLE_USER_INFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
/// Events of the signed-in user's primary calendar.
pub const GOOGLE_CALENDAR_EVENTS_URL: &str =
	"https://www.googleapis.com/calendar/v3/calendars/primary/events";
/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: [&str; 3] = [
	"https://www.googleapis.com/auth/userinfo.profile",
	"https://www.googleapis.com/auth/userinfo.email",
	"https://www.googleapis.com/auth/calendar.readonly",
];
/// Redirect URL used when none is configured.
pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:8080/callback";
/// Listen address used when none is configured.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
/// Minimum byte length of an operator-supplied cookie key.
pub const MIN_SESSION_KEY_LEN: usize = 64;

/// Authorization server endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEndpoints {
	/// Authorization endpoint the browser is redirected to.
	pub authorization: Url,
	/// Token endpoint used for the code exchange.
	pub token: Url,
}

/// OAuth client registration, built once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct OAuthCredentials {
	/// Public client identifier.
	pub client_id: String,
	/// Confidential client secret.
	pub client_secret: TokenSecret,
	/// Callback URL registered with the provider.
	pub redirect_url: Url,
	/// Scopes requested on every login.
	pub scopes: ScopeSet,
	/// Provider endpoints.
	pub endpoints: ProviderEndpoints,
}
impl OAuthCredentials {
	/// Starts a builder preloaded with Google endpoints and default scopes.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> OAuthCredentialsBuilder {
		OAuthCredentialsBuilder {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			redirect_url: DEFAULT_REDIRECT_URL.into(),
			scopes: None,
			authorization_url: GOOGLE_AUTHORIZATION_URL.into(),
			token_url: GOOGLE_TOKEN_URL.into(),
		}
	}
}

/// Validating builder for [`OAuthCredentials`].
#[derive(Clone, Debug)]
pub struct OAuthCredentialsBuilder {
	client_id: String,
	client_secret: String,
	redirect_url: String,
	scopes: Option<ScopeSet>,
	authorization_url: String,
	token_url: String,
}
impl OAuthCredentialsBuilder {
	/// Overrides the redirect URL.
	pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
		self.redirect_url = url.into();

		self
	}

	/// Overrides the requested scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = Some(scopes);

		self
	}

	/// Overrides the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: impl Into<String>) -> Self {
		self.authorization_url = url.into();

		self
	}

	/// Overrides the token endpoint.
	pub fn token_endpoint(mut self, url: impl Into<String>) -> Self {
		self.token_url = url.into();

		self
	}

	/// Validates every field and produces the credentials.
	pub fn build(self) -> Result<OAuthCredentials, ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingSetting { name: "client_id" });
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::MissingSetting { name: "client_secret" });
		}

		let scopes = match self.scopes {
			Some(scopes) => scopes,
			None => ScopeSet::new(DEFAULT_SCOPES)?,
		};

		if scopes.is_empty() {
			return Err(ConfigError::EmptyScope);
		}

		Ok(OAuthCredentials {
			client_id: self.client_id,
			client_secret: TokenSecret::new(self.client_secret),
			redirect_url: parse_endpoint("redirect", &self.redirect_url)?,
			scopes,
			endpoints: ProviderEndpoints {
				authorization: parse_endpoint("authorization", &self.authorization_url)?,
				token: parse_endpoint("token", &self.token_url)?,
			},
		})
	}
}

/// Protected resource endpoints called with the session's access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceEndpoints {
	/// User-info endpoint.
	pub user_info: Url,
	/// Calendar events listing endpoint.
	pub calendar_events: Url,
}
impl ResourceEndpoints {
	/// Validates both endpoints.
	pub fn new(user_info: &str, calendar_events: &str) -> Result<Self, ConfigError> {
		Ok(Self {
			user_info: parse_endpoint("user-info", user_info)?,
			calendar_events: parse_endpoint("calendar events", calendar_events)?,
		})
	}

	/// Google's user-info and primary calendar endpoints.
	pub fn google() -> Result<Self, ConfigError> {
		Self::new(GOOGLE_USER_INFO_URL, GOOGLE_CALENDAR_EVENTS_URL)
	}
}

/// HTTP server settings.
#[derive(Clone)]
pub struct ServerSettings {
	/// Socket address the server listens on.
	pub bind: SocketAddr,
	/// Cookie encryption key material; a random key is generated when absent.
	pub session_key: Option<Vec<u8>>,
	/// Whether session cookies carry the `Secure` attribute.
	pub secure_cookies: bool,
	/// Lifetime of a pending authorization.
	pub state_ttl: Duration,
}
impl Debug for ServerSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServerSettings")
			.field("bind", &self.bind)
			.field("session_key", &self.session_key.as_ref().map(|_| "<redacted>"))
			.field("secure_cookies", &self.secure_cookies)
			.field("state_ttl", &self.state_ttl)
			.finish()
	}
}

/// Full process configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
	/// OAuth client registration.
	pub credentials: OAuthCredentials,
	/// Resource endpoints.
	pub resources: ResourceEndpoints,
	/// Server settings.
	pub server: ServerSettings,
}
impl AppConfig {
	/// Loads `.env` (when present) and reads the process environment.
	#[cfg(feature = "server")]
	pub fn from_env() -> Result<Self, ConfigError> {
		if let Err(e) = dotenvy::dotenv()
			&& !e.not_found()
		{
			return Err(ConfigError::InvalidSetting { name: ".env", reason: e.to_string() });
		}

		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads settings through `lookup`, applying defaults for optional ones.
	///
	/// | Variable | Default |
	/// |---|---|
	/// | `GOOGLE_CLIENT_ID` | required |
	/// | `GOOGLE_CLIENT_SECRET` | required |
	/// | `GOOGLE_REDIRECT_URL` | `http://localhost:8080/callback` |
	/// | `GOOGLE_SCOPES` | profile, email, calendar.readonly |
	/// | `GOOGLE_AUTH_URL`, `GOOGLE_TOKEN_URL` | Google endpoints |
	/// | `GOOGLE_USERINFO_URL`, `GOOGLE_CALENDAR_EVENTS_URL` | Google endpoints |
	/// | `BIND_ADDR` | `127.0.0.1:8080` |
	/// | `SESSION_KEY` | random per process |
	/// | `SECURE_COOKIES` | `true` when the redirect URL is HTTPS |
	/// | `STATE_TTL_SECS` | 600 |
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let get = |name: &str| lookup(name).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
		let client_id = get("GOOGLE_CLIENT_ID")
			.ok_or(ConfigError::MissingSetting { name: "GOOGLE_CLIENT_ID" })?;
		let client_secret = get("GOOGLE_CLIENT_SECRET")
			.ok_or(ConfigError::MissingSetting { name: "GOOGLE_CLIENT_SECRET" })?;
		let mut builder = OAuthCredentials::builder(client_id, client_secret);

		if let Some(url) = get("GOOGLE_REDIRECT_URL") {
			builder = builder.redirect_url(url);
		}
		if let Some(raw) = get("GOOGLE_SCOPES") {
			builder = builder.scopes(ScopeSet::from_str(&raw)?);
		}
		if let Some(url) = get("GOOGLE_AUTH_URL") {
			builder = builder.authorization_endpoint(url);
		}
		if let Some(url) = get("GOOGLE_TOKEN_URL") {
			builder = builder.token_endpoint(url);
		}

		let credentials = builder.build()?;
		let resources = ResourceEndpoints::new(
			get("GOOGLE_USERINFO_URL").as_deref().unwrap_or(GOOGLE_USER_INFO_URL),
			get("GOOGLE_CALENDAR_EVENTS_URL").as_deref().unwrap_or(GOOGLE_CALENDAR_EVENTS_URL),
		)?;
		let bind = get("BIND_ADDR")
			.as_deref()
			.unwrap_or(DEFAULT_BIND_ADDR)
			.parse::<SocketAddr>()
			.map_err(|e| ConfigError::InvalidSetting { name: "BIND_ADDR", reason: e.to_string() })?;
		let session_key = match get("SESSION_KEY") {
			Some(key) if key.len() < MIN_SESSION_KEY_LEN =>
				return Err(ConfigError::InvalidSetting {
					name: "SESSION_KEY",
					reason: format!("expected at least {MIN_SESSION_KEY_LEN} bytes"),
				}),
			key => key.map(String::into_bytes),
		};
		let secure_cookies = match get("SECURE_COOKIES") {
			Some(raw) => parse_bool("SECURE_COOKIES", &raw)?,
			None => credentials.redirect_url.scheme() == "https",
		};
		let state_ttl = match get("STATE_TTL_SECS") {
			Some(raw) => raw
				.parse::<u32>()
				.ok()
				.filter(|secs| *secs > 0)
				.map(|secs| Duration::seconds(secs.into()))
				.ok_or_else(|| ConfigError::InvalidSetting {
					name: "STATE_TTL_SECS",
					reason: "expected a positive number of seconds".into(),
				})?,
			None => DEFAULT_STATE_TTL,
		};

		Ok(Self {
			credentials,
			resources,
			server: ServerSettings { bind, session_key, secure_cookies, state_ttl },
		})
	}
}

/// Parses `raw` and requires HTTPS unless the host is loopback.
fn parse_endpoint(endpoint: &'static str, raw: &str) -> Result<Url, ConfigError> {
	let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { endpoint, source })?;

	match url.scheme() {
		"https" => Ok(url),
		"http" if is_loopback(&url) => Ok(url),
		_ => Err(ConfigError::InsecureEndpoint { endpoint, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
	match raw.to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(ConfigError::InvalidSetting { name, reason: "expected a boolean".into() }),
	}
}
