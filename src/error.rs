//! Login-flow error types shared across the exchanger, stores, and resource clients.
//!
//! Display strings are safe to log: they carry OAuth error codes and HTTP statuses but never
//! tokens, provider error descriptions, or response bodies.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical login-flow error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; fatal at startup.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Session storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Token endpoint rejected or failed the code exchange.
	#[error(transparent)]
	Exchange(#[from] ExchangeError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Protected resource returned an unusable response.
	#[error(transparent)]
	Resource(#[from] ResourceError),

	/// The callback `state` did not match a live pending authorization for this session.
	///
	/// Missing, expired, and wrong states collapse into this single variant.
	#[error("Authorization state mismatch.")]
	StateMismatch,
	/// The provider redirected back with an OAuth `error` instead of a code.
	#[error("Provider denied the authorization request: {error}.")]
	AuthorizationDenied {
		/// OAuth error code from the callback query (e.g. `access_denied`).
		error: String,
	},
	/// The callback carried a valid state but no authorization code.
	#[error("Callback is missing the authorization code.")]
	MissingCode,
	/// The session holds no usable access token.
	#[error("Session is not authenticated.")]
	NotAuthenticated,
	/// The access token expired or was rejected by a resource server; sign in again.
	#[error("Access token expired or was rejected.")]
	CredentialExpired,
}
impl Error {
	/// Stable label for logs and metrics that never includes provider-supplied text.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Config(_) => "config",
			Self::Storage(_) => "storage",
			Self::Exchange(ExchangeError::CodeRejected { .. }) => "exchange_code_rejected",
			Self::Exchange(ExchangeError::ClientRejected { .. }) => "exchange_client_rejected",
			Self::Exchange(ExchangeError::MalformedResponse { .. }) =>
				"exchange_malformed_response",
			Self::Exchange(_) => "exchange",
			Self::Transport(_) => "transport",
			Self::Resource(_) => "resource",
			Self::StateMismatch => "state_mismatch",
			Self::AuthorizationDenied { .. } => "authorization_denied",
			Self::MissingCode => "missing_code",
			Self::NotAuthenticated => "not_authenticated",
			Self::CredentialExpired => "credential_expired",
		}
	}

	/// Returns `true` when the user must restart the login to recover.
	pub fn requires_login(&self) -> bool {
		matches!(self, Self::NotAuthenticated | Self::CredentialExpired)
	}
}

/// Configuration and validation failures raised while wiring the flow.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required setting was absent.
	#[error("Required setting `{name}` is missing.")]
	MissingSetting {
		/// Setting (environment variable or builder field) name.
		name: &'static str,
	},
	/// A setting could not be parsed.
	#[error("Setting `{name}` is invalid: {reason}.")]
	InvalidSetting {
		/// Setting name.
		name: &'static str,
		/// Short parse failure summary.
		reason: String,
	},
	/// A configured URL could not be parsed.
	#[error("The {endpoint} URL is invalid.")]
	InvalidUrl {
		/// Which URL failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Provider and resource endpoints must use HTTPS outside of loopback hosts.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// At least one scope must be requested.
	#[error("At least one scope must be requested.")]
	EmptyScope,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Access token builder validation failed.
	#[error("Unable to build access token.")]
	TokenBuild(#[from] crate::auth::AccessTokenBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token endpoint failures, kept apart so the orchestrator can tell them apart.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// The authorization code is invalid, expired, or already used. Never retry it.
	#[error("Token endpoint rejected the authorization code.")]
	CodeRejected {
		/// OAuth `error` code, when the provider supplied one.
		oauth_error: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Client authentication failed or the client is not allowed this grant.
	#[error("Token endpoint rejected the client credentials.")]
	ClientRejected {
		/// OAuth `error` code, when the provider supplied one.
		oauth_error: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Provider returned an unexpected, possibly temporary, failure.
	#[error("Token endpoint returned an unexpected response.")]
	Provider {
		/// OAuth `error` code, when the provider supplied one.
		oauth_error: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ExchangeError {
	/// Returns the HTTP status attached to the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::CodeRejected { status, .. }
			| Self::ClientRejected { status, .. }
			| Self::Provider { status, .. }
			| Self::MalformedResponse { status, .. } => *status,
			_ => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {target}.")]
	Network {
		/// Which upstream the request targeted.
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request timed out before the upstream answered.
	#[error("Request to the {target} timed out.")]
	Timeout {
		/// Which upstream the request targeted.
		target: &'static str,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(target: &'static str, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { target, source: Box::new(src) }
	}

	/// Classifies a reqwest failure for the provided upstream label.
	pub fn from_reqwest(target: &'static str, err: ReqwestError) -> Self {
		if err.is_timeout() { Self::Timeout { target } } else { Self::network(target, err) }
	}
}

/// Protected resource failures other than credential rejection.
#[derive(Debug, ThisError)]
pub enum ResourceError {
	/// Resource server answered with a non-success status other than 401.
	#[error("The {resource} endpoint returned HTTP {status}.")]
	Status {
		/// Resource label.
		resource: &'static str,
		/// HTTP status code.
		status: u16,
	},
	/// Response body did not match the expected JSON shape.
	#[error("The {resource} endpoint returned a malformed body.")]
	Decode {
		/// Resource label.
		resource: &'static str,
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The lower bound of the calendar listing could not be rendered.
	#[error("Failed to format the calendar time window.")]
	TimeWindow(#[from] time::error::Format),
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn kinds_are_stable_and_detail_free() {
		let denied = Error::AuthorizationDenied { error: "access_denied".into() };

		assert_eq!(denied.kind(), "authorization_denied");
		assert_eq!(Error::StateMismatch.kind(), "state_mismatch");
		assert_eq!(
			Error::from(ExchangeError::CodeRejected {
				oauth_error: Some("invalid_grant".into()),
				status: Some(400),
			})
			.kind(),
			"exchange_code_rejected"
		);
		assert_eq!(Error::from(ExchangeError::MissingExpiresIn).kind(), "exchange");
	}

	#[test]
	fn exchange_display_omits_provider_details() {
		let err = Error::from(ExchangeError::CodeRejected {
			oauth_error: Some("invalid_grant".into()),
			status: Some(400),
		});

		assert_eq!(err.to_string(), "Token endpoint rejected the authorization code.");
	}

	#[test]
	fn storage_error_keeps_source() {
		let store_error = StoreError::Backend { message: "disk full".into() };
		let err: Error = store_error.clone().into();
		let source =
			StdError::source(&err).expect("Storage errors should expose the store error as source.");

		assert_eq!(source.to_string(), store_error.to_string());
		assert!(!err.requires_login());
		assert!(Error::CredentialExpired.requires_login());
	}
}
