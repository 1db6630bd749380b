//! axum front end for [`LoginFlow`].
//!
//! The browser only ever holds an encrypted, `HttpOnly` cookie naming its [`SessionId`];
//! pending authorizations and tokens stay server-side in the flow's store.
//!
//! [`SessionId`]: crate::auth::SessionId

pub mod cookies;
pub mod routes;

// crates.io
use axum::{Router, extract::FromRef, routing::get};
use axum_extra::extract::cookie::Key;
// self
use crate::{_prelude::*, config::ServerSettings, error::ConfigError, flows::LoginFlow};

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
	/// Login flow serving all sessions.
	pub flow: LoginFlow,
	key: Key,
	secure_cookies: bool,
}
impl AppState {
	/// Derives the cookie key from `settings`, generating a random one when none is configured.
	pub fn new(flow: LoginFlow, settings: &ServerSettings) -> Result<Self, ConfigError> {
		let key = match &settings.session_key {
			Some(material) => Key::try_from(material.as_slice()).map_err(|e| {
				ConfigError::InvalidSetting { name: "SESSION_KEY", reason: e.to_string() }
			})?,
			None => {
				#[cfg(feature = "tracing")]
				tracing::warn!("SESSION_KEY is not set; sessions will not survive a restart.");

				Key::generate()
			},
		};

		Ok(Self { flow, key, secure_cookies: settings.secure_cookies })
	}

	/// Whether session cookies carry the `Secure` attribute.
	pub fn secure_cookies(&self) -> bool {
		self.secure_cookies
	}
}
impl FromRef<AppState> for Key {
	fn from_ref(state: &AppState) -> Self {
		state.key.clone()
	}
}
impl Debug for AppState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppState")
			.field("flow", &self.flow)
			.field("secure_cookies", &self.secure_cookies)
			.finish_non_exhaustive()
	}
}

/// Builds the application router.
///
/// | Route | Method | Handler |
/// |---|---|---|
/// | `/` | GET | [`routes::index`] |
/// | `/login` | GET | [`routes::login`] |
/// | `/callback` | GET | [`routes::callback`] |
/// | `/dashboard` | GET | [`routes::dashboard`] |
/// | `/logout` | GET, POST | [`routes::logout`] |
pub fn router(flow: LoginFlow, settings: &ServerSettings) -> Result<Router, ConfigError> {
	let state = AppState::new(flow, settings)?;

	Ok(Router::new()
		.route("/", get(routes::index))
		.route("/login", get(routes::login))
		.route("/callback", get(routes::callback))
		.route("/dashboard", get(routes::dashboard))
		.route("/logout", get(routes::logout).post(routes::logout))
		.with_state(state))
}
