//! Session cookie helpers.

// crates.io
use axum_extra::extract::{
	PrivateCookieJar,
	cookie::{Cookie, SameSite},
};
// self
use crate::auth::SessionId;

/// Name of the encrypted session cookie.
pub const SESSION_COOKIE: &str = "oauth2_calendar_session";

/// Session cookie scoped to the whole site and hidden from scripts.
pub fn session_cookie(session: &SessionId, secure: bool) -> Cookie<'static> {
	Cookie::build((SESSION_COOKIE, session.to_string()))
		.http_only(true)
		.secure(secure)
		.same_site(SameSite::Lax)
		.path("/")
		.build()
}

/// Removal cookie matching [`session_cookie`].
pub fn clear_session_cookie() -> Cookie<'static> {
	Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Session named by the cookie, if present and well formed.
pub fn session_id(jar: &PrivateCookieJar) -> Option<SessionId> {
	jar.get(SESSION_COOKIE).and_then(|cookie| SessionId::new(cookie.value()).ok())
}
