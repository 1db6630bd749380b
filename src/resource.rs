//! Protected resource calls made with a session's bearer token.

// crates.io
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::ResourceEndpoints,
	error::{ResourceError, TransportError},
	http::{self, RetryPolicy},
};

/// Upper bound on calendar pages fetched for one listing.
pub const MAX_EVENT_PAGES: usize = 10;

/// Boxed future returned by [`ResourceFetcher`] methods.
pub type ResourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Resource servers reachable with the session token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
	/// OAuth2 user-info endpoint.
	UserInfo,
	/// Calendar events listing.
	CalendarEvents,
}
impl ResourceKind {
	/// Stable label used in errors, logs, and metrics.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::UserInfo => "user-info",
			Self::CalendarEvents => "calendar events",
		}
	}
}
impl Display for ResourceKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Calls protected APIs on behalf of the token's owner.
///
/// A `401` from the resource server surfaces as [`Error::CredentialExpired`].
pub trait ResourceFetcher
where
	Self: Send + Sync,
{
	/// Fetches the signed-in user's profile.
	fn user_info<'a>(&'a self, token: &'a AccessToken) -> ResourceFuture<'a, UserInfo>;

	/// Lists events of the signed-in user's primary calendar.
	fn calendar_events<'a>(
		&'a self,
		token: &'a AccessToken,
	) -> ResourceFuture<'a, Vec<CalendarEvent>>;
}

/// Profile returned by the user-info endpoint. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	/// Stable account identifier.
	pub id: Option<String>,
	/// Primary email address.
	pub email: Option<String>,
	/// Whether the provider verified the address.
	pub verified_email: Option<bool>,
	/// Full display name.
	pub name: Option<String>,
	/// Given name.
	pub given_name: Option<String>,
	/// Family name.
	pub family_name: Option<String>,
	/// Avatar URL.
	pub picture: Option<String>,
	/// Preferred locale.
	pub locale: Option<String>,
}
impl UserInfo {
	/// Best available human-readable name.
	pub fn display_name(&self) -> &str {
		[&self.name, &self.given_name, &self.email]
			.into_iter()
			.flatten()
			.map(String::as_str)
			.find(|value| !value.trim().is_empty())
			.unwrap_or("there")
	}
}

/// Start or end of a calendar event: a timestamp for timed events, a date for all-day ones.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
	/// RFC 3339 timestamp.
	pub date_time: Option<String>,
	/// `YYYY-MM-DD` date.
	pub date: Option<String>,
	/// IANA time zone name.
	pub time_zone: Option<String>,
}
impl EventTime {
	/// Parses [`EventTime::date_time`], if present and well formed.
	pub fn instant(&self) -> Option<OffsetDateTime> {
		self.date_time.as_deref().and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
	}

	/// Raw timestamp or date, whichever is present.
	pub fn raw(&self) -> Option<&str> {
		self.date_time.as_deref().or(self.date.as_deref())
	}
}
impl Display for EventTime {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.raw().unwrap_or("?"))
	}
}

/// One entry of a calendar events listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
	/// Event identifier.
	pub id: Option<String>,
	/// Title.
	pub summary: Option<String>,
	/// Free-form description.
	pub description: Option<String>,
	/// Location text.
	pub location: Option<String>,
	/// `confirmed`, `tentative`, or `cancelled`.
	pub status: Option<String>,
	/// Link to the event in the calendar UI.
	pub html_link: Option<String>,
	/// Start time.
	#[serde(default)]
	pub start: EventTime,
	/// End time.
	#[serde(default)]
	pub end: EventTime,
}
impl CalendarEvent {
	/// Title, or a placeholder for untitled events.
	pub fn title(&self) -> &str {
		self.summary.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or("(no title)")
	}

	/// Parsed start instant of timed events.
	pub fn start_time(&self) -> Option<OffsetDateTime> {
		self.start.instant()
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
	#[serde(default)]
	items: Vec<CalendarEvent>,
	next_page_token: Option<String>,
}

/// [`ResourceFetcher`] over reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestResourceClient {
	client: ReqwestClient,
	endpoints: ResourceEndpoints,
	retry: RetryPolicy,
}
impl ReqwestResourceClient {
	/// Creates a client for the provided endpoints.
	pub fn new(client: ReqwestClient, endpoints: ResourceEndpoints) -> Self {
		Self { client, endpoints, retry: RetryPolicy::default() }
	}

	/// Overrides the retry policy.
	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	async fn get_json<T>(
		&self,
		kind: ResourceKind,
		url: &Url,
		query: &[(&str, &str)],
		token: &AccessToken,
	) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let request = self
			.client
			.get(url.clone())
			.bearer_auth(token.access_token.expose())
			.query(query)
			.build()
			.map_err(|e| TransportError::from_reqwest(kind.as_str(), e))?;
		let response = http::execute_with_retry(&self.client, self.retry, request, true)
			.await
			.map_err(|e| TransportError::from_reqwest(kind.as_str(), e))?;

		decode(kind, response).await
	}
}
impl ResourceFetcher for ReqwestResourceClient {
	fn user_info<'a>(&'a self, token: &'a AccessToken) -> ResourceFuture<'a, UserInfo> {
		Box::pin(async move {
			self.get_json(ResourceKind::UserInfo, &self.endpoints.user_info, &[], token).await
		})
	}

	fn calendar_events<'a>(
		&'a self,
		token: &'a AccessToken,
	) -> ResourceFuture<'a, Vec<CalendarEvent>> {
		Box::pin(async move {
			let kind = ResourceKind::CalendarEvents;
			let time_min =
				OffsetDateTime::now_utc().format(&Rfc3339).map_err(ResourceError::from)?;
			let mut events = Vec::new();
			let mut page_token: Option<String> = None;

			for _ in 0..MAX_EVENT_PAGES {
				let mut query = vec![
					("timeMin", time_min.as_str()),
					("singleEvents", "true"),
					("orderBy", "startTime"),
				];

				if let Some(page) = page_token.as_deref() {
					query.push(("pageToken", page));
				}

				let page: EventsPage =
					self.get_json(kind, &self.endpoints.calendar_events, &query, token).await?;

				events.extend(page.items);

				match page.next_page_token {
					Some(next) if !next.is_empty() => page_token = Some(next),
					_ => return Ok(events),
				}
			}

			#[cfg(feature = "tracing")]
			tracing::warn!(pages = MAX_EVENT_PAGES, "Calendar listing truncated at the page cap.");

			Ok(events)
		})
	}
}

async fn decode<T>(kind: ResourceKind, response: Response) -> Result<T>
where
	T: DeserializeOwned,
{
	let status = response.status();

	if status == StatusCode::UNAUTHORIZED {
		return Err(Error::CredentialExpired);
	}
	if !status.is_success() {
		let status = status.as_u16();

		return Err(ResourceError::Status { resource: kind.as_str(), status }.into());
	}

	let body = response.bytes().await.map_err(|e| TransportError::from_reqwest(kind.as_str(), e))?;
	let mut de = serde_json::Deserializer::from_slice(&body);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| ResourceError::Decode { resource: kind.as_str(), source }.into())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn display_name_falls_back_through_fields() {
		let mut info = UserInfo { email: Some("ada@example.com".into()), ..Default::default() };

		assert_eq!(info.display_name(), "ada@example.com");

		info.given_name = Some("Ada".into());

		assert_eq!(info.display_name(), "Ada");

		info.name = Some("Ada Lovelace".into());

		assert_eq!(info.display_name(), "Ada Lovelace");
		assert_eq!(UserInfo::default().display_name(), "there");
	}

	#[test]
	fn events_decode_timed_and_all_day_entries() {
		let page: EventsPage = serde_json::from_str(
			r#"{
				"items": [
					{
						"id": "e1",
						"summary": "Standup",
						"htmlLink": "https://calendar.google.com/event?eid=e1",
						"start": { "dateTime": "2025-03-03T09:00:00Z" },
						"end": { "dateTime": "2025-03-03T09:15:00Z" }
					},
					{ "id": "e2", "start": { "date": "2025-03-04" }, "end": { "date": "2025-03-05" } }
				],
				"nextPageToken": "p2"
			}"#,
		)
		.expect("Events page fixture should decode.");

		assert_eq!(page.next_page_token.as_deref(), Some("p2"));
		assert_eq!(page.items[0].title(), "Standup");
		assert_eq!(
			page.items[0].start_time(),
			Some(time::macros::datetime!(2025-03-03 09:00 UTC))
		);
		assert_eq!(page.items[1].title(), "(no title)");
		assert_eq!(page.items[1].start.to_string(), "2025-03-04");
		assert_eq!(page.items[1].start_time(), None);
	}

	#[test]
	fn resource_labels_are_stable() {
		assert_eq!(ResourceKind::UserInfo.to_string(), "user-info");
		assert_eq!(ResourceKind::CalendarEvents.as_str(), "calendar events");
	}
}
