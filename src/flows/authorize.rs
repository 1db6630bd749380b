//! Authorization URL construction.

// self
use crate::{
	_prelude::*,
	auth::{AuthorizationState, PendingAuthorization},
	config::OAuthCredentials,
};

/// Where to send the browser to start a login, plus the state it must bring back.
#[derive(Clone)]
pub struct AuthorizationRequest {
	/// Fully-formed authorization URL.
	pub url: Url,
	/// Anti-forgery value embedded in [`AuthorizationRequest::url`].
	pub state: AuthorizationState,
}
impl Debug for AuthorizationRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationRequest")
			.field("authorization_endpoint", &self.url.path())
			.field("state", &self.state)
			.finish()
	}
}

/// Builds the provider authorization URL for a pending login attempt.
///
/// Parameters: `response_type=code`, `client_id`, `redirect_uri`, space-delimited `scope`,
/// `state`, and the S256 PKCE challenge.
pub fn build_authorization_url(
	credentials: &OAuthCredentials,
	pending: &PendingAuthorization,
) -> AuthorizationRequest {
	let mut url = credentials.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", &credentials.client_id);
	pairs.append_pair("redirect_uri", credentials.redirect_url.as_str());

	if !credentials.scopes.is_empty() {
		pairs.append_pair("scope", &credentials.scopes.normalized());
	}

	pairs.append_pair("state", pending.state.as_str());
	pairs.append_pair("code_challenge", &pending.pkce_verifier.challenge());
	pairs.append_pair("code_challenge_method", pending.pkce_verifier.method().as_str());

	drop(pairs);

	AuthorizationRequest { url, state: pending.state.clone() }
}
