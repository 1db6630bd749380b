//! Authorization-code exchange through the `oauth2` crate.
//!
//! [`TokenExchanger`] is the seam the login flow depends on. [`OAuth2Exchanger`] implements it
//! with a pre-configured [`BasicClient`] that authenticates with `client_secret_post`, and maps
//! every failure into one [`ExchangeError`] or [`TransportError`] variant so callers can tell a
//! dead authorization code from a misconfigured client or a flaky provider.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, PkceVerifier, ScopeSet},
	config::OAuthCredentials,
	error::{ConfigError, ExchangeError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

const TOKEN_ENDPOINT: &str = "token endpoint";

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Boxed future returned by [`TokenExchanger::exchange`].
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<AccessToken>> + 'a + Send>>;

/// Trades a one-time authorization code for an access token.
///
/// Implementations send the code at most once; a code the provider rejected is dead.
pub trait TokenExchanger
where
	Self: Send + Sync,
{
	/// Exchanges `code` together with the PKCE verifier stored for the login attempt.
	fn exchange<'a>(&'a self, code: &'a str, verifier: &'a PkceVerifier) -> ExchangeFuture<'a>;
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() =>
				ConfigError::from(*inner).into(),
			HttpClientError::Reqwest(inner) =>
				TransportError::from_reqwest(TOKEN_ENDPOINT, *inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			_ => provider_failure(None, meta).into(),
		}
	}
}

/// [`TokenExchanger`] backed by the `oauth2` crate and a pluggable HTTP transport.
pub struct OAuth2Exchanger<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	requested_scope: ScopeSet,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl OAuth2Exchanger {
	/// Builds an exchanger that talks to the token endpoint through `client`.
	pub fn reqwest(credentials: &OAuthCredentials, client: ReqwestClient) -> Result<Self> {
		Self::new(
			credentials,
			ReqwestHttpClient::with_client(client),
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> OAuth2Exchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Configures the `oauth2` client once from validated credentials.
	pub fn new(
		credentials: &OAuthCredentials,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(credentials.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidUrl { endpoint: "authorization", source })?;
		let token_url = TokenUrl::new(credentials.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidUrl { endpoint: "token", source })?;
		let redirect_url = RedirectUrl::new(credentials.redirect_url.to_string())
			.map_err(|source| ConfigError::InvalidUrl { endpoint: "redirect", source })?;
		let oauth_client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
			.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self {
			oauth_client,
			requested_scope: credentials.scopes.clone(),
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}
}
impl<C, M> TokenExchanger for OAuth2Exchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange<'a>(&'a self, code: &'a str, verifier: &'a PkceVerifier) -> ExchangeFuture<'a> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(verifier.secret().to_owned()))
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

			token_from_response(&self.requested_scope, response)
		})
	}
}
impl<C, M> Debug for OAuth2Exchanger<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2Exchanger")
			.field("token_url", &self.oauth_client.token_uri().as_str())
			.field("requested_scope", &self.requested_scope)
			.finish_non_exhaustive()
	}
}

fn token_from_response(
	requested_scope: &ScopeSet,
	response: BasicTokenResponse,
) -> Result<AccessToken> {
	let expires_in = response.expires_in().ok_or(ExchangeError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ExchangeError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ExchangeError::NonPositiveExpiresIn.into());
	}

	let granted = match response.scopes() {
		Some(scopes) if !scopes.is_empty() =>
			ScopeSet::new(scopes.iter().map(|scope| scope.as_ref())).map_err(ConfigError::from)?,
		_ => requested_scope.clone(),
	};
	let issued_at = OffsetDateTime::now_utc();
	let expires_at = issued_at
		.checked_add(Duration::seconds(expires_in))
		.ok_or(ExchangeError::ExpiresInOutOfRange)?;
	let mut builder = AccessToken::builder(granted)
		.access_token(response.access_token().secret().to_owned())
		.token_type(response.token_type().as_ref())
		.issued_at(issued_at)
		.expires_at(expires_at);

	if let Some(refresh) = response.refresh_token() {
		builder = builder.refresh_token(refresh.secret().to_owned());
	}

	builder.build().map_err(|e| ConfigError::from(e).into())
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response(response, meta).into(),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta, error),
		// Error pages that are not JSON are classified by status instead of as malformed tokens.
		RequestTokenError::Parse(_, _)
			if meta_status(meta).is_some_and(|status| !(200..300).contains(&status)) =>
			classify_token_error(None, meta).into(),
		RequestTokenError::Parse(source, _body) =>
			ExchangeError::MalformedResponse { source, status: meta_status(meta) }.into(),
		RequestTokenError::Other(_) => provider_failure(None, meta).into(),
	}
}

fn map_server_response(
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> ExchangeError {
	classify_token_error(Some(response.error().as_ref().to_owned()), meta)
}

fn classify_token_error(
	oauth_error: Option<String>,
	meta: Option<&ResponseMetadata>,
) -> ExchangeError {
	let status = meta_status(meta);
	let by_code = oauth_error.as_deref().and_then(|code| {
		if code.eq_ignore_ascii_case("invalid_grant") || code.eq_ignore_ascii_case("access_denied")
		{
			Some(true)
		} else if code.eq_ignore_ascii_case("invalid_client")
			|| code.eq_ignore_ascii_case("unauthorized_client")
		{
			Some(false)
		} else {
			None
		}
	});
	let code_rejected = match (by_code, status) {
		(Some(code_rejected), _) => Some(code_rejected),
		(None, _) if oauth_error.is_some() => None,
		(None, Some(400 | 404 | 410)) => Some(true),
		(None, Some(401)) => Some(false),
		(None, _) => None,
	};

	match code_rejected {
		Some(true) => ExchangeError::CodeRejected { oauth_error, status },
		Some(false) => ExchangeError::ClientRejected { oauth_error, status },
		None => provider_failure(oauth_error, meta),
	}
}

fn provider_failure(
	oauth_error: Option<String>,
	meta: Option<&ResponseMetadata>,
) -> ExchangeError {
	ExchangeError::Provider {
		oauth_error,
		status: meta_status(meta),
		retry_after: meta.and_then(|value| value.retry_after),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}
