//! Anti-forgery `state`, PKCE verifiers, and the pending half of a login attempt.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::token::secret::constant_time_eq};

/// Lifetime of a pending authorization before callbacks carrying its state are refused.
pub const DEFAULT_STATE_TTL: Duration = Duration::minutes(10);

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Opaque per-attempt anti-forgery value round-tripped through the provider redirect.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationState(String);
impl AuthorizationState {
	/// Draws a fresh value from the thread-local CSPRNG.
	pub fn generate() -> Self {
		Self(random_string(STATE_LEN))
	}

	/// Value placed in the `state` query parameter.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Compares against a value returned by the provider without early exit.
	pub fn matches(&self, returned: &str) -> bool {
		constant_time_eq(self.0.as_bytes(), returned.as_bytes())
	}
}
impl Debug for AuthorizationState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AuthorizationState").field(&"<redacted>").finish()
	}
}

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Secret PKCE verifier kept server-side until the code exchange.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PkceVerifier(String);
impl PkceVerifier {
	/// Generates a 64-character verifier.
	pub fn generate() -> Self {
		Self(random_string(PKCE_VERIFIER_LEN))
	}

	/// Raw verifier sent to the token endpoint. Never log it.
	pub fn secret(&self) -> &str {
		&self.0
	}

	/// `BASE64URL(SHA256(verifier))` without padding.
	pub fn challenge(&self) -> String {
		let digest = Sha256::digest(self.0.as_bytes());

		URL_SAFE_NO_PAD.encode(digest)
	}

	/// Challenge method paired with [`PkceVerifier::challenge`].
	pub fn method(&self) -> PkceCodeChallengeMethod {
		PkceCodeChallengeMethod::S256
	}
}
impl Debug for PkceVerifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("PkceVerifier").field(&"<redacted>").finish()
	}
}

/// State and PKCE verifier stored against a session between `/login` and `/callback`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingAuthorization {
	/// Anti-forgery value expected back on the callback.
	pub state: AuthorizationState,
	/// PKCE verifier matching the challenge embedded in the authorization URL.
	pub pkce_verifier: PkceVerifier,
	/// Instant the login attempt started.
	pub issued_at: OffsetDateTime,
}
impl PendingAuthorization {
	/// Starts a new login attempt at `now`.
	pub fn generate(now: OffsetDateTime) -> Self {
		Self {
			state: AuthorizationState::generate(),
			pkce_verifier: PkceVerifier::generate(),
			issued_at: now,
		}
	}

	/// Returns `true` once the attempt is older than `ttl`.
	pub fn is_expired_at(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		now - self.issued_at >= ttl
	}
}

/// Checks the callback `state` against the session's pending authorization.
///
/// Every failure (nothing pending, attempt expired, state absent from the callback, or a
/// different value) maps to [`Error::StateMismatch`] so callers cannot learn which check failed.
pub fn validate_state(
	pending: Option<&PendingAuthorization>,
	returned: Option<&str>,
	now: OffsetDateTime,
	ttl: Duration,
) -> Result<()> {
	let (Some(pending), Some(returned)) = (pending, returned) else {
		return Err(Error::StateMismatch);
	};

	if pending.is_expired_at(now, ttl) || !pending.state.matches(returned) {
		return Err(Error::StateMismatch);
	}

	Ok(())
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashSet;
	// self
	use super::*;

	#[test]
	fn states_are_unique_and_alphanumeric() {
		let states: HashSet<_> =
			(0..256).map(|_| AuthorizationState::generate().as_str().to_owned()).collect();

		assert_eq!(states.len(), 256);
		assert!(states.iter().all(|s| s.len() == STATE_LEN));
		assert!(states.iter().flat_map(|s| s.chars()).all(|c| c.is_ascii_alphanumeric()));
	}

	#[test]
	fn pkce_challenge_matches_rfc7636_vector() {
		let verifier = PkceVerifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".into());

		assert_eq!(verifier.challenge(), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
		assert_eq!(verifier.method().as_str(), "S256");
	}

	#[test]
	fn validation_accepts_only_live_matching_state() {
		let now = OffsetDateTime::now_utc();
		let pending = PendingAuthorization::generate(now);
		let state = pending.state.as_str().to_owned();

		assert!(validate_state(Some(&pending), Some(&state), now, DEFAULT_STATE_TTL).is_ok());

		let failures = [
			validate_state(None, Some(&state), now, DEFAULT_STATE_TTL),
			validate_state(Some(&pending), None, now, DEFAULT_STATE_TTL),
			validate_state(Some(&pending), Some("forged"), now, DEFAULT_STATE_TTL),
			validate_state(Some(&pending), Some(""), now, DEFAULT_STATE_TTL),
			validate_state(
				Some(&pending),
				Some(&state),
				now + DEFAULT_STATE_TTL,
				DEFAULT_STATE_TTL,
			),
		];

		for failure in failures {
			assert!(matches!(failure, Err(Error::StateMismatch)));
		}
	}

	#[test]
	fn debug_hides_state_and_verifier() {
		let pending = PendingAuthorization::generate(OffsetDateTime::now_utc());
		let rendered = format!("{pending:?}");

		assert!(!rendered.contains(pending.state.as_str()));
		assert!(!rendered.contains(pending.pkce_verifier.secret()));
	}
}
