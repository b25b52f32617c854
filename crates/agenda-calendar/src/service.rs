//! Calendar operations over an [`AuthSession`].

use std::sync::Arc;

use agenda_auth::{AuthSession, HttpResponse, RequestOptions};
use agenda_core::{CalendarEvent, EventDraft, TimeWindow};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::{self, ApiEvent, EventListResponse};
use crate::error::{CalendarError, CalendarResult};

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// The signed-in user's default calendar.
pub const PRIMARY_CALENDAR: &str = "primary";

/// Largest page size the events.list endpoint accepts.
const MAX_RESULTS: u32 = 2500;

/// Which calendars to talk to, and where.
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub base_url: String,
    /// Calendar that is read and written.
    pub calendar_id: String,
    /// Read-only calendar merged into day views.
    pub holiday_calendar_id: Option<String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            base_url: CALENDAR_API_BASE.to_string(),
            calendar_id: PRIMARY_CALENDAR.to_string(),
            holiday_calendar_id: None,
        }
    }
}

impl CalendarConfig {
    /// Builder method to set the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builder method to set the calendar ID.
    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    /// Builder method to set the holiday calendar.
    pub fn with_holiday_calendar(mut self, calendar_id: impl Into<String>) -> Self {
        self.holiday_calendar_id = Some(calendar_id.into());
        self
    }
}

/// Range filter for events.list.
#[derive(Debug, Clone, Copy)]
enum EventRange {
    /// Everything ending after `now`.
    Upcoming(DateTime<Utc>),
    /// Everything overlapping the window.
    Window(TimeWindow),
}

/// Calendar CRUD on behalf of the signed-in user.
///
/// Every call goes through [`AuthSession::make_authenticated_request`], so
/// expired tokens are refreshed transparently. When that fails the error is an
/// auth failure (see [`CalendarError::is_auth_failure`]) and the session's
/// expiry listener has already been told.
#[derive(Debug, Clone)]
pub struct CalendarService {
    session: Arc<AuthSession>,
    config: CalendarConfig,
}

impl CalendarService {
    pub fn new(session: Arc<AuthSession>, config: CalendarConfig) -> Self {
        Self { session, config }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    /// Lists all upcoming events of the calendar, following every page.
    pub async fn get_events(&self) -> CalendarResult<Vec<CalendarEvent>> {
        self.list_events(&self.config.calendar_id, EventRange::Upcoming(Utc::now()))
            .await
    }

    /// Lists the calendar's events overlapping `window`.
    pub async fn get_events_in_window(
        &self,
        window: TimeWindow,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        self.list_events(&self.config.calendar_id, EventRange::Window(window))
            .await
    }

    /// Lists the events of one local day, holidays included, sorted by start.
    ///
    /// Holiday events are read-only. A holiday calendar that fails for any
    /// reason other than authentication is skipped with a warning.
    pub async fn get_events_for_date<Tz: TimeZone>(
        &self,
        date: NaiveDate,
        tz: &Tz,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let window = TimeWindow::for_date(date, tz).ok_or(CalendarError::DateOutOfRange(date))?;
        let range = EventRange::Window(window);

        let mut events = self.list_events(&self.config.calendar_id, range).await?;

        if let Some(holiday_id) = &self.config.holiday_calendar_id {
            match self.list_events(holiday_id, range).await {
                Ok(holidays) => events.extend(holidays.into_iter().map(CalendarEvent::into_holiday)),
                Err(e) if e.is_auth_failure() => return Err(e),
                Err(e) => warn!(calendar = %holiday_id, error = %e, "skipping holiday calendar"),
            }
        }

        // All-day events start at local midnight, ahead of timed events at 00:00.
        events.sort_by_key(|event| (event.start.to_utc_in(tz), !event.start.is_all_day()));
        debug!("{} events on {}", events.len(), date);
        Ok(events)
    }

    /// Creates an event and returns it as stored by the server.
    pub async fn create_event(&self, draft: &EventDraft) -> CalendarResult<CalendarEvent> {
        draft.validate()?;
        let url = self.events_url(&self.config.calendar_id, None);
        let options = RequestOptions::post().with_json(&api::format_event_for_api(draft))?;

        let response = self.session.make_authenticated_request(&url, options).await?;
        let event = self.parse_event(response)?;
        info!(event_id = %event.id, "created event");
        Ok(event)
    }

    /// Replaces an event's editable fields and returns the updated event.
    pub async fn update_event(
        &self,
        event_id: &str,
        draft: &EventDraft,
    ) -> CalendarResult<CalendarEvent> {
        draft.validate()?;
        let url = self.events_url(&self.config.calendar_id, Some(event_id));
        let options = RequestOptions::put().with_json(&api::format_event_for_api(draft))?;

        let response = self.session.make_authenticated_request(&url, options).await?;
        let event = self.parse_event(response)?;
        info!(event_id = %event.id, "updated event");
        Ok(event)
    }

    /// Deletes an event.
    pub async fn delete_event(&self, event_id: &str) -> CalendarResult<()> {
        let url = self.events_url(&self.config.calendar_id, Some(event_id));
        let response = self
            .session
            .make_authenticated_request(&url, RequestOptions::delete())
            .await?;
        if !response.is_success() {
            return Err(api_error(&response));
        }
        info!(event_id, "deleted event");
        Ok(())
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        range: EventRange,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.list_url(calendar_id, range, page_token.as_deref())?;
            let response = self
                .session
                .make_authenticated_request(url.as_str(), RequestOptions::get())
                .await?;
            let page: EventListResponse = parse_success(response)?;

            debug!("fetched {} events from calendar {}", page.items.len(), calendar_id);
            events.extend(
                page.items
                    .into_iter()
                    .filter_map(|event| event.into_event(calendar_id)),
            );

            match page.next_page_token {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    warn!(calendar = %calendar_id, "server repeated page token, stopping pagination");
                    break;
                }
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(events)
    }

    fn events_url(&self, calendar_id: &str, event_id: Option<&str>) -> String {
        let mut url = format!(
            "{}/calendars/{}/events",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(calendar_id)
        );
        if let Some(event_id) = event_id {
            url.push('/');
            url.push_str(&urlencoding::encode(event_id));
        }
        url
    }

    fn list_url(
        &self,
        calendar_id: &str,
        range: EventRange,
        page_token: Option<&str>,
    ) -> CalendarResult<Url> {
        let base = self.events_url(calendar_id, None);
        let mut url = Url::parse(&base)
            .map_err(|e| CalendarError::Configuration(format!("invalid base URL {}: {}", base, e)))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("maxResults", &MAX_RESULTS.to_string())
                .append_pair("singleEvents", "true")
                .append_pair("orderBy", "startTime");
            match range {
                EventRange::Upcoming(now) => {
                    query.append_pair("timeMin", &rfc3339(now));
                }
                EventRange::Window(window) => {
                    query
                        .append_pair("timeMin", &rfc3339(window.start))
                        .append_pair("timeMax", &rfc3339(window.end));
                }
            }
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        Ok(url)
    }

    fn parse_event(&self, response: HttpResponse) -> CalendarResult<CalendarEvent> {
        let event: ApiEvent = parse_success(response)?;
        event.into_event(&self.config.calendar_id).ok_or_else(|| {
            CalendarError::InvalidResponse("event is missing its id or times".to_string())
        })
    }
}

fn rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_success<T: DeserializeOwned>(response: HttpResponse) -> CalendarResult<T> {
    if !response.is_success() {
        return Err(api_error(&response));
    }
    serde_json::from_str(&response.body)
        .map_err(|e| CalendarError::InvalidResponse(format!("failed to parse response: {}", e)))
}

fn api_error(response: &HttpResponse) -> CalendarError {
    let message = api::error_message(&response.body).unwrap_or_else(|| {
        response
            .status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    });
    CalendarError::Api {
        status: response.status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenda_auth::{
        AuthError, AuthResult, BoxFuture, HttpRequest, HttpTransport, IdentityProvider,
        IssuedTokens, MemoryStore, Method, StatusCode, TokenStore,
    };
    use agenda_core::DraftError;
    use chrono::{Duration, FixedOffset};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysSignedIn;

    impl IdentityProvider for AlwaysSignedIn {
        fn is_signed_in(&self) -> BoxFuture<'_, AuthResult<bool>> {
            Box::pin(async { Ok(true) })
        }

        fn get_tokens(&self) -> BoxFuture<'_, AuthResult<IssuedTokens>> {
            Box::pin(async { Ok(IssuedTokens::new("T2")) })
        }

        fn sign_out(&self) -> BoxFuture<'_, AuthResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    /// Answers requests in order and records them.
    #[derive(Default)]
    struct FakeServer {
        responses: Mutex<VecDeque<HttpResponse>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl FakeServer {
        fn with(responses: Vec<(StatusCode, &str)>) -> Arc<Self> {
            let responses = responses
                .into_iter()
                .map(|(status, body)| HttpResponse::new(status, body))
                .collect();
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl HttpTransport for FakeServer {
        fn send(&self, request: HttpRequest) -> BoxFuture<'_, AuthResult<HttpResponse>> {
            self.requests.lock().unwrap().push(request);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AuthError::transport("no scripted response"));
            Box::pin(async move { next })
        }
    }

    fn service(server: Arc<FakeServer>, config: CalendarConfig) -> CalendarService {
        let store = TokenStore::new(Arc::new(MemoryStore::with_entries([("token", "T1")])));
        let session = AuthSession::new(store, Arc::new(AlwaysSignedIn), server);
        CalendarService::new(Arc::new(session), config)
    }

    fn draft() -> EventDraft {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let start = offset.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        EventDraft::new("Lunch", start, start + Duration::hours(1))
    }

    const CREATED: &str = r#"{
        "id": "abc123",
        "summary": "Lunch",
        "start": {"dateTime": "2025-06-02T12:00:00+02:00"},
        "end": {"dateTime": "2025-06-02T13:00:00+02:00"},
        "status": "confirmed",
        "htmlLink": "https://calendar.google.com/event?eid=abc123"
    }"#;

    #[tokio::test]
    async fn get_events_follows_pages() {
        let server = FakeServer::with(vec![
            (
                StatusCode::OK,
                r#"{"items": [
                    {"id": "a", "start": {"dateTime": "2030-01-01T09:00:00Z"}, "end": {"dateTime": "2030-01-01T10:00:00Z"}},
                    {"id": "gone", "status": "cancelled"}
                ], "nextPageToken": "p2"}"#,
            ),
            (
                StatusCode::OK,
                r#"{"items": [
                    {"id": "b", "start": {"date": "2030-01-02"}, "end": {"date": "2030-01-03"}}
                ]}"#,
            ),
        ]);
        let calendar = service(server.clone(), CalendarConfig::default());

        let events = calendar.get_events().await.unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        let first = Url::parse(&requests[0].url).unwrap();
        assert_eq!(first.path(), "/calendar/v3/calendars/primary/events");
        let query: Vec<(String, String)> = first.query_pairs().into_owned().collect();
        assert!(query.contains(&("maxResults".into(), "2500".into())));
        assert!(query.contains(&("singleEvents".into(), "true".into())));
        assert!(query.contains(&("orderBy".into(), "startTime".into())));
        assert!(query.iter().any(|(k, _)| k == "timeMin"));
        assert!(!query.iter().any(|(k, _)| k == "timeMax" || k == "pageToken"));
        assert!(requests[1].url.contains("pageToken=p2"));
        assert_eq!(requests[0].header("authorization"), Some("Bearer T1"));
    }

    #[tokio::test]
    async fn day_view_merges_read_only_holidays() {
        let server = FakeServer::with(vec![
            (
                StatusCode::OK,
                r#"{"items": [
                    {"id": "late", "start": {"dateTime": "2025-12-25T15:00:00Z"}, "end": {"dateTime": "2025-12-25T16:00:00Z"}},
                    {"id": "early", "start": {"dateTime": "2025-12-25T08:00:00Z"}, "end": {"dateTime": "2025-12-25T09:00:00Z"}}
                ]}"#,
            ),
            (
                StatusCode::OK,
                r#"{"items": [
                    {"id": "xmas", "summary": "Christmas Day", "start": {"date": "2025-12-25"}, "end": {"date": "2025-12-26"}}
                ]}"#,
            ),
        ]);
        let config = CalendarConfig::default().with_holiday_calendar("en.usa#holiday@group.v.calendar.google.com");
        let calendar = service(server.clone(), config);

        let day = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
        let events = calendar.get_events_for_date(day, &Utc).await.unwrap();

        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["xmas", "early", "late"]);
        assert!(events[0].is_holiday && !events[0].is_editable);
        assert!(!events[1].is_holiday && events[1].is_editable);

        let requests = server.requests();
        let window: Vec<(String, String)> = Url::parse(&requests[0].url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .filter(|(k, _)| k.starts_with("time"))
            .collect();
        assert_eq!(
            window,
            [
                ("timeMin".to_string(), "2025-12-25T00:00:00Z".to_string()),
                ("timeMax".to_string(), "2025-12-26T00:00:00Z".to_string()),
            ]
        );
        assert!(requests[1].url.contains("/calendars/en.usa%23holiday%40group.v.calendar.google.com/events"));
    }

    #[tokio::test]
    async fn day_view_puts_holidays_first_east_of_utc() {
        let server = FakeServer::with(vec![
            (
                StatusCode::OK,
                r#"{"items": [
                    {"id": "standup", "start": {"dateTime": "2025-06-02T10:00:00+09:00"}, "end": {"dateTime": "2025-06-02T10:15:00+09:00"}},
                    {"id": "breakfast", "start": {"dateTime": "2025-06-02T08:00:00+09:00"}, "end": {"dateTime": "2025-06-02T09:00:00+09:00"}}
                ]}"#,
            ),
            (
                StatusCode::OK,
                r#"{"items": [
                    {"id": "holiday", "summary": "Holiday", "start": {"date": "2025-06-02"}, "end": {"date": "2025-06-03"}}
                ]}"#,
            ),
        ]);
        let config = CalendarConfig::default().with_holiday_calendar("ja.japanese#holiday@group.v.calendar.google.com");
        let calendar = service(server, config);

        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let events = calendar
            .get_events_for_date(day, &chrono_tz::Asia::Tokyo)
            .await
            .unwrap();

        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["holiday", "breakfast", "standup"]);
    }

    #[tokio::test]
    async fn repeated_page_token_stops_pagination() {
        let page = r#"{"items": [
            {"id": "a", "start": {"dateTime": "2030-01-01T09:00:00Z"}, "end": {"dateTime": "2030-01-01T10:00:00Z"}}
        ], "nextPageToken": "same"}"#;
        let server = FakeServer::with(vec![(StatusCode::OK, page), (StatusCode::OK, page)]);
        let calendar = service(server.clone(), CalendarConfig::default());

        let events = calendar.get_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn day_window_uses_local_midnight() {
        let server = FakeServer::with(vec![(StatusCode::OK, r#"{"items": []}"#)]);
        let calendar = service(server.clone(), CalendarConfig::default());

        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        calendar
            .get_events_for_date(day, &chrono_tz::Europe::Paris)
            .await
            .unwrap();

        let url = Url::parse(&server.requests()[0].url).unwrap();
        let time_min = url
            .query_pairs()
            .find(|(k, _)| k == "timeMin")
            .map(|(_, v)| v.into_owned());
        assert_eq!(time_min.as_deref(), Some("2025-06-01T22:00:00Z"));
    }

    #[tokio::test]
    async fn failing_holiday_calendar_is_skipped() {
        let server = FakeServer::with(vec![
            (
                StatusCode::OK,
                r#"{"items": [{"id": "a", "start": {"dateTime": "2025-06-02T09:00:00Z"}, "end": {"dateTime": "2025-06-02T10:00:00Z"}}]}"#,
            ),
            (StatusCode::NOT_FOUND, r#"{"error": {"code": 404, "message": "Not Found"}}"#),
        ]);
        let config = CalendarConfig::default().with_holiday_calendar("missing");
        let calendar = service(server, config);

        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let events = calendar.get_events_for_date(day, &Utc).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn create_event_posts_body() {
        let server = FakeServer::with(vec![(StatusCode::OK, CREATED)]);
        let calendar = service(server.clone(), CalendarConfig::default());

        let event = calendar
            .create_event(&draft().with_location("Cafe"))
            .await
            .unwrap();
        assert_eq!(event.id, "abc123");
        assert_eq!(event.calendar_id, "primary");

        let request = &server.requests()[0];
        assert_eq!(request.method, Method::POST);
        assert!(request.url.ends_with("/calendars/primary/events"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["summary"], "Lunch");
        assert_eq!(body["location"], "Cafe");
        assert_eq!(body["start"]["dateTime"], "2025-06-02T12:00:00+02:00");
    }

    #[tokio::test]
    async fn invalid_draft_sends_nothing() {
        let server = FakeServer::with(vec![]);
        let calendar = service(server.clone(), CalendarConfig::default());

        let mut untitled = draft();
        untitled.summary = "  ".to_string();
        let err = calendar.create_event(&untitled).await.unwrap_err();
        assert!(matches!(err, CalendarError::InvalidEvent(DraftError::MissingTitle)));

        let mut backwards = draft();
        backwards.end = backwards.start;
        let err = calendar.update_event("abc123", &backwards).await.unwrap_err();
        assert!(matches!(err, CalendarError::InvalidEvent(DraftError::EndBeforeStart)));

        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn update_event_puts_to_event_path() {
        let server = FakeServer::with(vec![(StatusCode::OK, CREATED)]);
        let calendar = service(server.clone(), CalendarConfig::default());

        calendar.update_event("abc/123", &draft()).await.unwrap();

        let request = &server.requests()[0];
        assert_eq!(request.method, Method::PUT);
        assert!(request.url.ends_with("/calendars/primary/events/abc%2F123"));
    }

    #[tokio::test]
    async fn delete_event_statuses() {
        let server = FakeServer::with(vec![
            (StatusCode::NO_CONTENT, ""),
            (StatusCode::GONE, r#"{"error": {"code": 410, "message": "Resource has been deleted"}}"#),
        ]);
        let calendar = service(server.clone(), CalendarConfig::default());

        calendar.delete_event("abc123").await.unwrap();
        let err = calendar.delete_event("abc123").await.unwrap_err();
        match err {
            CalendarError::Api { status, message } => {
                assert_eq!(status, 410);
                assert_eq!(message, "Resource has been deleted");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(server.requests()[0].method, Method::DELETE);
    }

    #[tokio::test]
    async fn expired_session_surfaces_as_auth_failure() {
        let server = FakeServer::with(vec![
            (StatusCode::UNAUTHORIZED, ""),
            (StatusCode::UNAUTHORIZED, ""),
        ]);
        let calendar = service(server.clone(), CalendarConfig::default());
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        let _subscription = calendar.session().subscribe_expired(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = calendar.delete_event("abc123").await.unwrap_err();
        assert!(err.is_auth_failure());
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn transport_failure_is_not_auth_failure() {
        let server = FakeServer::with(vec![]);
        let calendar = service(server, CalendarConfig::default());

        let err = calendar.get_events().await.unwrap_err();
        assert!(matches!(err, CalendarError::Auth(_)));
        assert!(!err.is_auth_failure());
    }

    #[tokio::test]
    async fn malformed_list_is_invalid_response() {
        let server = FakeServer::with(vec![(StatusCode::OK, "<html>")]);
        let calendar = service(server, CalendarConfig::default());

        let err = calendar.get_events().await.unwrap_err();
        assert!(matches!(err, CalendarError::InvalidResponse(_)));
    }

    #[test]
    fn base_url_overrides() {
        let server = FakeServer::with(vec![]);
        let config = CalendarConfig::default()
            .with_base_url("http://127.0.0.1:8080/v3/")
            .with_calendar_id("team@example.com");
        let calendar = service(server, config);
        assert_eq!(
            calendar.events_url("team@example.com", Some("e1")),
            "http://127.0.0.1:8080/v3/calendars/team%40example.com/events/e1"
        );

        let bad = service(
            FakeServer::with(vec![]),
            CalendarConfig::default().with_base_url("not a url"),
        );
        assert!(matches!(
            bad.list_url(PRIMARY_CALENDAR, EventRange::Upcoming(Utc::now()), None),
            Err(CalendarError::Configuration(_))
        ));
    }
}
