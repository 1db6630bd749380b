//! Browser session identifiers carried in the session cookie.

// std
use std::{borrow::Borrow, ops::Deref};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

const SESSION_ID_LEN: usize = 32;
const SESSION_ID_MAX_LEN: usize = 128;

/// Error returned when session identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("Session identifier cannot be empty.")]
	Empty,
	/// The identifier contains characters that are unsafe inside a cookie value.
	#[error("Session identifier contains unsupported characters.")]
	UnsupportedCharacter,
	/// The identifier exceeded the allowed character count.
	#[error("Session identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Opaque identifier correlating a browser's requests across the login round trip.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);
impl SessionId {
	/// Creates a session identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}

	/// Generates a fresh, unguessable identifier for a new browser session.
	pub fn generate() -> Self {
		Self(rand::rng().sample_iter(Alphanumeric).take(SESSION_ID_LEN).map(char::from).collect())
	}
}
impl Deref for SessionId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for SessionId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for SessionId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<SessionId> for String {
	fn from(value: SessionId) -> Self {
		value.0
	}
}
impl TryFrom<String> for SessionId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl FromStr for SessionId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for SessionId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Session({})", self.0)
	}
}
impl Display for SessionId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn validate_view(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if !view.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
		return Err(IdentifierError::UnsupportedCharacter);
	}
	if view.len() > SESSION_ID_MAX_LEN {
		return Err(IdentifierError::TooLong { max: SESSION_ID_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashSet;
	// self
	use super::*;

	#[test]
	fn identifiers_reject_cookie_unsafe_values() {
		assert!(SessionId::new("").is_err());
		assert!(SessionId::new("with space").is_err());
		assert!(SessionId::new("semi;colon").is_err());
		assert!(SessionId::new("a".repeat(SESSION_ID_MAX_LEN + 1)).is_err());

		let id = SessionId::new("sess-123_abc").expect("Session fixture should be valid.");

		assert_eq!(id.as_ref(), "sess-123_abc");
	}

	#[test]
	fn generated_identifiers_are_unique_and_valid() {
		let ids: HashSet<_> = (0..64).map(|_| SessionId::generate()).collect();

		assert_eq!(ids.len(), 64);

		for id in ids {
			assert_eq!(id.len(), SESSION_ID_LEN);
			SessionId::new(id.as_ref()).expect("Generated identifiers should pass validation.");
		}
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let id: SessionId =
			serde_json::from_str("\"abc123\"").expect("Session should deserialize successfully.");

		assert_eq!(id.as_ref(), "abc123");
		assert!(serde_json::from_str::<SessionId>("\"bad value\"").is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<SessionId, u8> = HashMap::from_iter([(
			SessionId::new("sess-1").expect("Session used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("sess-1"), Some(&7));
	}
}
