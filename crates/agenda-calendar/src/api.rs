//! Google Calendar API wire types.

use agenda_core::{CalendarEvent, EventDraft, EventTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventListResponse {
    #[serde(default)]
    pub items: Vec<ApiEvent>,
    pub next_page_token: Option<String>,
}

/// A single event from the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiEvent {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub start: ApiEventTime,
    #[serde(default)]
    pub end: ApiEventTime,
    pub html_link: Option<String>,
    pub status: Option<String>,
    pub etag: Option<String>,
}

/// Event time from the API: `date` for all-day events, `dateTime` otherwise.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiEventTime {
    pub date: Option<String>,
    pub date_time: Option<String>,
    pub time_zone: Option<String>,
}

impl ApiEvent {
    /// Converts to a [`CalendarEvent`]. Cancelled events and events without
    /// an id or parseable times yield `None`.
    pub fn into_event(self, calendar_id: &str) -> Option<CalendarEvent> {
        if self.status.as_deref() == Some("cancelled") {
            return None;
        }

        let id = self.id?;
        let Some(start) = EventTime::parse(self.start.date.as_deref(), self.start.date_time.as_deref())
        else {
            warn!("event {} has no valid start time", id);
            return None;
        };
        let Some(end) = EventTime::parse(self.end.date.as_deref(), self.end.date_time.as_deref())
        else {
            warn!("event {} has no valid end time", id);
            return None;
        };

        let mut event = CalendarEvent::new(id, start, end, calendar_id);
        event.summary = self.summary;
        event.description = self.description;
        event.location = self.location;
        event.status = self.status;
        event.html_link = self.html_link;
        event.time_zone = self.start.time_zone;
        event.etag = self.etag;
        Some(event)
    }
}

/// Request body for creating or updating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventBody {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: ApiDateTime,
    pub end: ApiDateTime,
}

/// A timed boundary in a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDateTime {
    /// RFC 3339 instant with the offset the user picked.
    pub date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// Builds the API request body for a draft.
///
/// Blank descriptions and locations are left out. The draft is not
/// validated here.
pub fn format_event_for_api(draft: &EventDraft) -> ApiEventBody {
    let non_blank = |s: &str| {
        let trimmed = s.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };

    ApiEventBody {
        summary: draft.summary.trim().to_string(),
        description: non_blank(&draft.description),
        location: non_blank(&draft.location),
        start: ApiDateTime {
            date_time: draft.start.to_rfc3339(),
            time_zone: draft.time_zone.clone(),
        },
        end: ApiDateTime {
            date_time: draft.end.to_rfc3339(),
            time_zone: draft.time_zone.clone(),
        },
    }
}

/// Extracts a readable message from an API error body.
///
/// Google wraps errors as `{"error": {"message": ...}}`; OAuth endpoints use
/// `{"error": "..."}`. Anything else falls back to the raw body.
pub(crate) fn error_message(body: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &value["error"];
        if let Some(message) = error["message"].as_str().or_else(|| error.as_str()) {
            return Some(message.to_string());
        }
    }
    let body = body.trim();
    (!body.is_empty()).then(|| body.to_string())
}
