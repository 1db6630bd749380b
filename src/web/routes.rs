//! Route handlers.

// crates.io
use axum::{
	extract::{Query, State, rejection::QueryRejection},
	http::StatusCode,
	response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
// self
use crate::{
	_prelude::*,
	auth::SessionId,
	flows::CallbackParams,
	web::{AppState, cookies},
};

/// Error rendered as a plain-text response with a status matching its cause.
#[derive(Debug)]
pub struct ErrorResponse(Error);
impl ErrorResponse {
	/// HTTP status for the wrapped error.
	pub fn status(&self) -> StatusCode {
		status_for(&self.0)
	}
}
impl From<Error> for ErrorResponse {
	fn from(value: Error) -> Self {
		Self(value)
	}
}
impl IntoResponse for ErrorResponse {
	fn into_response(self) -> Response {
		let status = self.status();
		let body = if self.0.requires_login() {
			"Not signed in. Visit /login to continue."
		} else if status == StatusCode::BAD_GATEWAY {
			"Upstream request failed. Please try again later."
		} else if status.is_server_error() {
			"Internal server error."
		} else {
			"Bad request."
		};

		(status, body).into_response()
	}
}

/// `GET /`
pub async fn index() -> &'static str {
	"oauth2-calendar\n\nVisit /login to sign in with Google and list your calendar events.\n"
}

/// `GET /login`: issues a session cookie if needed and redirects to the provider.
pub async fn login(
	State(state): State<AppState>,
	jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), ErrorResponse> {
	let session = cookies::session_id(&jar).unwrap_or_else(SessionId::generate);
	let request = state.flow.initiate_login(&session).await?;
	let jar = jar.add(cookies::session_cookie(&session, state.secure_cookies()));

	Ok((jar, Redirect::temporary(request.url.as_str())))
}

/// `GET /callback`: completes the login and redirects to the dashboard, or home on failure.
pub async fn callback(
	State(state): State<AppState>,
	jar: PrivateCookieJar,
	params: Result<Query<CallbackParams>, QueryRejection>,
) -> Redirect {
	let Some(session) = cookies::session_id(&jar) else {
		#[cfg(feature = "tracing")]
		tracing::info!("Callback arrived without a session cookie.");

		return Redirect::to("/");
	};
	// Repeated or undecodable parameters are treated like a mismatched state.
	let Ok(Query(params)) = params else {
		#[cfg(feature = "tracing")]
		tracing::info!("Callback query could not be decoded.");

		return Redirect::to("/");
	};

	match state.flow.handle_callback(&session, params).await {
		Ok(_) => Redirect::to("/dashboard"),
		Err(_) => Redirect::to("/"),
	}
}

/// `GET /dashboard`: greets the user and lists their calendar events.
pub async fn dashboard(
	State(state): State<AppState>,
	jar: PrivateCookieJar,
) -> Result<String, ErrorResponse> {
	let session = cookies::session_id(&jar).ok_or(Error::NotAuthenticated)?;
	let dashboard = state.flow.dashboard(&session).await?;

	Ok(dashboard.render())
}

/// `GET|POST /logout`: forgets the session and drops its cookie.
pub async fn logout(
	State(state): State<AppState>,
	jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), ErrorResponse> {
	if let Some(session) = cookies::session_id(&jar) {
		state.flow.logout(&session).await?;
	}

	Ok((jar.remove(cookies::clear_session_cookie()), Redirect::to("/")))
}

fn status_for(err: &Error) -> StatusCode {
	match err {
		Error::NotAuthenticated | Error::CredentialExpired => StatusCode::UNAUTHORIZED,
		Error::StateMismatch | Error::AuthorizationDenied { .. } | Error::MissingCode =>
			StatusCode::BAD_REQUEST,
		Error::Exchange(_) | Error::Transport(_) | Error::Resource(_) => StatusCode::BAD_GATEWAY,
		Error::Config(_) | Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
	}
}
