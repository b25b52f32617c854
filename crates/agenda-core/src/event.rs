//! Calendar event types.
//!
//! - [`CalendarEvent`]: an event as returned by the calendar service
//! - [`EventDraft`]: the user-editable fields sent when creating or updating

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::EventTime;

/// An event read from the remote calendar service.
///
/// Events are held transiently for display and are never cached to disk.
/// Mutations go through the calendar service, which returns the canonical
/// representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Opaque identifier, unique within its source calendar.
    pub id: String,
    /// Event title.
    pub summary: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Location text.
    pub location: Option<String>,
    /// Start time.
    pub start: EventTime,
    /// End time.
    pub end: EventTime,
    /// The calendar this event was read from.
    pub calendar_id: String,
    /// Whether the event comes from a holiday calendar.
    pub is_holiday: bool,
    /// Whether the user may edit or delete the event (primary calendar only).
    pub is_editable: bool,
    /// Event status (`confirmed`, `tentative`, `cancelled`).
    pub status: Option<String>,
    /// Link to the event in the calendar web UI.
    pub html_link: Option<String>,
    /// IANA timezone the event was scheduled in.
    pub time_zone: Option<String>,
    /// Entity tag of this revision.
    pub etag: Option<String>,
}

impl CalendarEvent {
    /// Creates an event with the required fields. It is editable by default.
    pub fn new(
        id: impl Into<String>,
        start: EventTime,
        end: EventTime,
        calendar_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            summary: None,
            description: None,
            location: None,
            start,
            end,
            calendar_id: calendar_id.into(),
            is_holiday: false,
            is_editable: true,
            status: None,
            html_link: None,
            time_zone: None,
            etag: None,
        }
    }

    /// Builder method to set the title.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Marks the event as coming from a read-only holiday calendar.
    pub fn into_holiday(mut self) -> Self {
        self.is_holiday = true;
        self.is_editable = false;
        self
    }

    /// Returns the title, or `"Untitled Event"` when none was set.
    pub fn title(&self) -> &str {
        match self.summary.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => "Untitled Event",
        }
    }

    /// Returns true if this is an all-day event.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }
}

/// Reasons an [`EventDraft`] cannot be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    /// The title is empty after trimming.
    #[error("please enter a title for the event")]
    MissingTitle,
    /// The end is not strictly after the start.
    #[error("end time must be after start time")]
    EndBeforeStart,
}

/// The fields a user supplies when creating or editing an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Event title.
    pub summary: String,
    /// Description; omitted from the request when blank.
    pub description: String,
    /// Location; omitted from the request when blank.
    pub location: String,
    /// Start instant.
    pub start: DateTime<FixedOffset>,
    /// End instant.
    pub end: DateTime<FixedOffset>,
    /// IANA timezone to attach to start and end.
    pub time_zone: Option<String>,
}

impl EventDraft {
    /// Creates a draft with a title and time range.
    pub fn new(
        summary: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            summary: summary.into(),
            description: String::new(),
            location: String::new(),
            start,
            end,
            time_zone: None,
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Builder method to set the timezone.
    pub fn with_time_zone(mut self, tz: impl Into<String>) -> Self {
        self.time_zone = Some(tz.into());
        self
    }

    /// Checks that the draft can be submitted.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.summary.trim().is_empty() {
            return Err(DraftError::MissingTitle);
        }
        if self.start >= self.end {
            return Err(DraftError::EndBeforeStart);
        }
        Ok(())
    }

    /// Prefills a draft from an existing timed event. All-day events have no
    /// time range to edit and yield `None`.
    pub fn from_event(event: &CalendarEvent) -> Option<Self> {
        let start = *event.start.as_datetime()?;
        let end = *event.end.as_datetime()?;
        let mut draft = Self::new(event.summary.clone().unwrap_or_default(), start, end);
        draft.description = event.description.clone().unwrap_or_default();
        draft.location = event.location.clone().unwrap_or_default();
        draft.time_zone = event.time_zone.clone();
        Some(draft)
    }
}
