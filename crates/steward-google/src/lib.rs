//! `steward-google` — Google Calendar and Gmail for the configured account.
//!
//! [`GoogleClient`] exchanges the refresh token from `[google]` for access
//! tokens and talks to the Calendar v3 and Gmail v1 REST APIs. The services
//! record every call in the action log.

pub mod calendar;
pub mod client;
pub mod error;
pub mod mail;

#[cfg(test)]
mod testing;

pub use calendar::{CalendarEvent, CalendarService, CreateEventRequest, DEFAULT_UPCOMING_HOURS};
pub use client::GoogleClient;
pub use error::{GoogleError, Result};
pub use mail::{EmailMessage, MailService, DEFAULT_MAIL_QUERY};
