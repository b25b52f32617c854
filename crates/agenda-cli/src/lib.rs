//! Command-line front end for agenda.
//!
//! This crate provides the `agenda` binary: sign-in, day view and event
//! editing on top of [`agenda_auth::AuthSession`] and
//! [`agenda_calendar::CalendarService`].

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use context::AppContext;
pub use error::{ClientError, ClientResult};
