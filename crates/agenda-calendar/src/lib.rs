//! Google Calendar access for agenda.
//!
//! [`CalendarService`] is a thin layer over
//! [`AuthSession::make_authenticated_request`](agenda_auth::AuthSession::make_authenticated_request):
//! it builds the events URLs, encodes drafts with [`format_event_for_api`] and
//! decodes the responses into [`agenda_core::CalendarEvent`]s.

pub mod api;
pub mod error;
pub mod service;

pub use api::{ApiDateTime, ApiEventBody, format_event_for_api};
pub use error::{CalendarError, CalendarResult};
pub use service::{CALENDAR_API_BASE, CalendarConfig, CalendarService, PRIMARY_CALENDAR};
