// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use oauth2_calendar::{
	auth::SessionId,
	config::AppConfig,
	error::{Error, ExchangeError},
	flows::{CallbackParams, FlowState, LoginFlow},
	store::{MemoryStore, SessionStore},
};

const TOKEN_BODY: &str =
	"{\"access_token\":\"T1\",\"token_type\":\"Bearer\",\"expires_in\":3600,\"scope\":\"https://www.googleapis.com/auth/calendar.readonly\"}";
const USER_BODY: &str = "{\"id\":\"42\",\"email\":\"ada@example.com\",\"name\":\"Ada Lovelace\"}";
const EVENTS_BODY: &str = "{\"items\":[{\"id\":\"e1\",\"summary\":\"Standup\",\"start\":{\"dateTime\":\"2025-03-03T09:00:00Z\"},\"end\":{\"dateTime\":\"2025-03-03T09:15:00Z\"}}]}";

fn build_flow(server: &MockServer) -> (LoginFlow, Arc<MemoryStore>) {
	let token_url = server.url("/token");
	let user_info_url = server.url("/userinfo");
	let events_url = server.url("/calendars/primary/events");
	let vars = [
		("GOOGLE_CLIENT_ID", "client-it"),
		("GOOGLE_CLIENT_SECRET", "secret-it"),
		("GOOGLE_TOKEN_URL", token_url.as_str()),
		("GOOGLE_USERINFO_URL", user_info_url.as_str()),
		("GOOGLE_CALENDAR_EVENTS_URL", events_url.as_str()),
	];
	let config = AppConfig::from_lookup(|name| {
		vars.iter().find(|(key, _)| *key == name).map(|(_, value)| (*value).to_owned())
	})
	.expect("Mock configuration should validate.");
	let store = Arc::new(MemoryStore::default());
	let flow =
		LoginFlow::from_config(&config, store.clone()).expect("Flow should wire from configuration.");

	(flow, store)
}

async fn start_login(flow: &LoginFlow, session: &SessionId) -> String {
	flow.initiate_login(session).await.expect("Login should start.").state.as_str().to_owned()
}

fn callback(state: &str, code: &str) -> CallbackParams {
	CallbackParams { state: Some(state.into()), code: Some(code.into()), error: None }
}

#[tokio::test]
async fn login_then_dashboard_lists_the_standup() {
	let server = MockServer::start_async().await;
	let (flow, store) = build_flow(&server);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let user_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/userinfo").header("authorization", "Bearer T1");
			then.status(200).header("content-type", "application/json").body(USER_BODY);
		})
		.await;
	let events_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/calendars/primary/events")
				.header("authorization", "Bearer T1")
				.query_param("singleEvents", "true")
				.query_param("orderBy", "startTime");
			then.status(200).header("content-type", "application/json").body(EVENTS_BODY);
		})
		.await;
	let session = SessionId::generate();
	let state = start_login(&flow, &session).await;
	let token = flow
		.handle_callback(&session, callback(&state, "C1"))
		.await
		.expect("Callback with the issued state should succeed.");

	token_mock.assert_calls_async(1).await;

	assert_eq!(token.access_token.expose(), "T1");
	assert!(token.scope.contains("https://www.googleapis.com/auth/calendar.readonly"));

	let stored = store
		.get_token(&session)
		.await
		.expect("Store should load.")
		.expect("Token should be stored for the session.");

	assert_eq!(stored.access_token.expose(), "T1");

	let dashboard = flow.dashboard(&session).await.expect("Dashboard should load.");
	let rendered = dashboard.render();

	user_mock.assert_calls_async(1).await;
	events_mock.assert_calls_async(1).await;

	assert_eq!(dashboard.events.len(), 1);
	assert!(rendered.contains("Welcome Ada Lovelace"));
	assert!(rendered.contains("Standup"));
	assert_eq!(flow.metrics().exchanges_attempted(), 1);
	assert_eq!(flow.metrics().callbacks_accepted(), 1);
}

#[tokio::test]
async fn calendar_pages_are_followed() {
	let server = MockServer::start_async().await;
	let (flow, store) = build_flow(&server);
	let session = SessionId::generate();

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;

	let second_page = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/calendars/primary/events")
				.query_param_exists("timeMin")
				.query_param("pageToken", "p2");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"items\":[{\"summary\":\"Retro\"}]}");
		})
		.await;
	let first_page = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/calendars/primary/events")
				.query_param_exists("timeMin")
				.query_param("orderBy", "startTime");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"items\":[{\"summary\":\"Standup\"}],\"nextPageToken\":\"p2\"}");
		})
		.await;
	let state = start_login(&flow, &session).await;

	flow.handle_callback(&session, callback(&state, "C1")).await.expect("Login should succeed.");

	let events = flow.calendar_events(&session).await.expect("Events should load.");
	let titles: Vec<_> = events.iter().map(|event| event.title()).collect();

	assert_eq!(titles, ["Standup", "Retro"]);

	first_page.assert_calls_async(1).await;
	second_page.assert_calls_async(1).await;

	assert!(store.get_token(&session).await.expect("Store should load.").is_some());
}

#[tokio::test]
async fn mismatched_state_never_reaches_the_token_endpoint() {
	let server = MockServer::start_async().await;
	let (flow, store) = build_flow(&server);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let session = SessionId::generate();

	start_login(&flow, &session).await;

	let err = flow
		.handle_callback(&session, callback("S2", "C1"))
		.await
		.expect_err("A mismatched state must be rejected.");

	assert!(matches!(err, Error::StateMismatch));

	token_mock.assert_calls_async(0).await;

	assert!(store.get_token(&session).await.expect("Store should load.").is_none());
}

#[tokio::test]
async fn invalid_grant_is_reported_as_a_rejected_code() {
	let server = MockServer::start_async().await;
	let (flow, store) = build_flow(&server);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Bad Request\"}");
		})
		.await;
	let session = SessionId::generate();
	let state = start_login(&flow, &session).await;
	let err = flow
		.handle_callback(&session, callback(&state, "used-code"))
		.await
		.expect_err("A rejected code must fail the callback.");

	match err {
		Error::Exchange(ExchangeError::CodeRejected { oauth_error, status }) => {
			assert_eq!(oauth_error.as_deref(), Some("invalid_grant"));
			assert_eq!(status, Some(400));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	// Rejected codes are never retried.
	token_mock.assert_calls_async(1).await;

	assert!(store.get_token(&session).await.expect("Store should load.").is_none());
	assert_eq!(
		flow.session_state(&session).await.expect("State should load."),
		FlowState::Anonymous
	);
}

#[tokio::test]
async fn token_endpoint_server_errors_surface_as_provider_failures() {
	let server = MockServer::start_async().await;
	let (flow, store) = build_flow(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).header("retry-after", "7").body("upstream down");
		})
		.await;

	let session = SessionId::generate();
	let state = start_login(&flow, &session).await;
	let err = flow
		.handle_callback(&session, callback(&state, "C1"))
		.await
		.expect_err("A failing token endpoint must fail the callback.");

	assert!(matches!(err, Error::Exchange(ExchangeError::Provider { status: Some(503), .. })));
	assert!(!err.to_string().contains("upstream down"));
	assert!(store.get_token(&session).await.expect("Store should load.").is_none());
}

#[tokio::test]
async fn overflowing_expires_in_is_rejected_without_storing() {
	let server = MockServer::start_async().await;
	let (flow, store) = build_flow(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"T1\",\"token_type\":\"Bearer\",\"expires_in\":9223372036854775807}",
			);
		})
		.await;

	let session = SessionId::generate();
	let state = start_login(&flow, &session).await;
	let err = flow
		.handle_callback(&session, callback(&state, "C1"))
		.await
		.expect_err("An expiry beyond the supported range must fail the callback.");

	assert!(matches!(err, Error::Exchange(ExchangeError::ExpiresInOutOfRange)));
	assert!(store.get_token(&session).await.expect("Store should load.").is_none());
	assert_eq!(
		flow.session_state(&session).await.expect("State should load."),
		FlowState::Anonymous
	);
}

#[tokio::test]
async fn unauthorized_resource_revokes_the_session_token() {
	let server = MockServer::start_async().await;
	let (flow, store) = build_flow(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;

	let user_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/userinfo");
			then.status(401).body("{\"error\":{\"code\":401}}");
		})
		.await;
	let session = SessionId::generate();
	let state = start_login(&flow, &session).await;

	flow.handle_callback(&session, callback(&state, "C1")).await.expect("Login should succeed.");

	let err = flow.dashboard(&session).await.expect_err("A 401 must fail the dashboard.");

	assert!(matches!(err, Error::CredentialExpired));
	assert!(store.get_token(&session).await.expect("Store should load.").is_none());

	let err = flow.user_info(&session).await.expect_err("The revoked token must not be reused.");

	assert!(matches!(err, Error::NotAuthenticated));

	user_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn malformed_resource_bodies_are_reported_without_revoking() {
	let server = MockServer::start_async().await;
	let (flow, store) = build_flow(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/calendars/primary/events");
			then.status(200).header("content-type", "application/json").body("{\"items\":7}");
		})
		.await;

	let session = SessionId::generate();
	let state = start_login(&flow, &session).await;

	flow.handle_callback(&session, callback(&state, "C1")).await.expect("Login should succeed.");

	let err = flow.calendar_events(&session).await.expect_err("A malformed body must fail.");

	assert_eq!(err.kind(), "resource");
	assert!(store.get_token(&session).await.expect("Store should load.").is_some());
}

#[tokio::test]
async fn unreachable_token_endpoint_fails_without_storing() {
	let vars = [
		("GOOGLE_CLIENT_ID", "client-it"),
		("GOOGLE_CLIENT_SECRET", "secret-it"),
		("GOOGLE_TOKEN_URL", "http://127.0.0.1:9/token"),
	];
	let config = AppConfig::from_lookup(|name| {
		vars.iter().find(|(key, _)| *key == name).map(|(_, value)| (*value).to_owned())
	})
	.expect("Configuration should validate.");
	let store = Arc::new(MemoryStore::default());
	let flow =
		LoginFlow::from_config(&config, store.clone()).expect("Flow should wire from configuration.");
	let session = SessionId::generate();
	let state = start_login(&flow, &session).await;
	let err = flow
		.handle_callback(&session, callback(&state, "C1"))
		.await
		.expect_err("An unreachable token endpoint must fail the callback.");

	assert_eq!(err.kind(), "transport");
	assert!(store.get_token(&session).await.expect("Store should load.").is_none());
	assert_eq!(
		flow.session_state(&session).await.expect("State should load."),
		FlowState::Anonymous
	);
}
