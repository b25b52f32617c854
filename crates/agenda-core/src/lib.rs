//! Core types: calendar events, event times, user profile, tracing setup

pub mod event;
pub mod profile;
pub mod time;
pub mod tracing;

pub use event::{CalendarEvent, DraftError, EventDraft};
pub use profile::UserProfile;
pub use time::{EventTime, TimeWindow};
pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
