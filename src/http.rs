//! HTTP transport shared by the token exchange and the resource client.
//!
//! [`TokenHttpClient`] is the exchanger's only dependency on an HTTP stack. Each token request
//! gets a short-lived [`AsyncHttpClient`] handle bound to a [`ResponseMetadataSlot`], so the
//! exchanger can classify failures with the status and `Retry-After` hint of the response that
//! produced them. Handles call [`ResponseMetadataSlot::take`] before dispatching and
//! [`ResponseMetadataSlot::store`] once a status is known.
//!
//! [`RetryPolicy`] bounds the retries of the reqwest-backed transports. Token requests are
//! retried only when the connection could not be established, so an authorization code is never
//! delivered twice; resource GETs are also retried on timeouts.

// std
use std::{ops::Deref, time::Duration as StdDuration};
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::{
	Request as ReqwestRequest, redirect,
	header::{HeaderMap, RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Abstraction over HTTP transports capable of executing token exchanges while publishing
/// response metadata for error classification.
///
/// Implementations must be `Send + Sync + 'static`, and the handles they return must own
/// whatever state their request futures need so those futures stay `Send`.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Metadata from the most recent HTTP response, used when mapping errors.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Bounded retry schedule for transient transport failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts including the first one.
	pub max_attempts: u32,
	/// Base delay, multiplied by the attempt number.
	pub backoff: StdDuration,
}
impl RetryPolicy {
	/// Policy that never retries.
	pub const NEVER: Self = Self { max_attempts: 1, backoff: StdDuration::ZERO };

	/// Decides whether attempt number `attempt` (1-based) should be followed by another one.
	///
	/// Connect failures are always retryable because the request never reached the server.
	/// Timeouts are retryable only for idempotent requests.
	pub fn should_retry(&self, attempt: u32, err: &ReqwestError, idempotent: bool) -> bool {
		attempt < self.max_attempts && (err.is_connect() || (idempotent && err.is_timeout()))
	}

	/// Delay before the attempt following `attempt`.
	pub fn backoff_for(&self, attempt: u32) -> StdDuration {
		self.backoff.saturating_mul(attempt)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_attempts: 3, backoff: StdDuration::from_millis(200) }
	}
}

/// Builds the reqwest client used for both token and resource calls.
///
/// Redirects are never followed: token endpoints answer directly, and a redirected resource
/// call would carry the bearer token to another origin.
pub fn default_client() -> Result<ReqwestClient, ConfigError> {
	Ok(ReqwestClient::builder()
		.redirect(redirect::Policy::none())
		.timeout(DEFAULT_TIMEOUT)
		.build()?)
}

/// Reqwest-backed [`TokenHttpClient`] with connect-failure retries.
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient {
	client: ReqwestClient,
	retry: RetryPolicy,
}
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	///
	/// Configure custom clients to disable redirect following.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, retry: RetryPolicy::default() }
	}

	/// Overrides the retry policy.
	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Builds an instrumented HTTP client that captures response metadata.
	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle(Arc::new(InstrumentedHttpClient {
			client: self.client.clone(),
			retry: self.retry,
			slot,
		}))
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.client
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.client
	}
}
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

struct InstrumentedHttpClient {
	client: ReqwestClient,
	retry: RetryPolicy,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`TokenHttpClient`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let request = ReqwestRequest::try_from(request).map_err(Box::new)?;
			let response = execute_with_retry(&client.client, client.retry, request, false)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Sends `request`, re-sending a clone while `retry` allows it.
pub(crate) async fn execute_with_retry(
	client: &ReqwestClient,
	retry: RetryPolicy,
	request: ReqwestRequest,
	idempotent: bool,
) -> Result<reqwest::Response, ReqwestError> {
	let mut attempt = 1;

	loop {
		let Some(next) = request.try_clone() else {
			return client.execute(request).await;
		};

		match client.execute(next).await {
			Err(err) if retry.should_retry(attempt, &err, idempotent) => {
				#[cfg(feature = "tracing")]
				tracing::debug!(
					attempt,
					url = %request.url(),
					"Retrying request after transport failure."
				);

				tokio::time::sleep(retry.backoff_for(attempt)).await;

				attempt += 1;
			},
			result => return result,
		}
	}
}

/// Parses a `Retry-After` header given either as delta-seconds or an HTTP date.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
