// --- File: crates/helios_common/src/services.rs ---
//! Service abstractions for external collaborators.
//!
//! These traits decouple the scheduling core from the concrete calendar
//! provider and mail dispatcher, allowing failure injection in tests. All
//! methods return the shared [`SchedulingError`] taxonomy so callers can
//! classify failures (auth vs. provider) without knowing the implementation.

use crate::error::SchedulingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Type alias for a boxed future that returns a Result.
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Decrypted, in-memory view of a user's provider credentials.
///
/// Derived from the stored connection on read; never persisted in this form.
#[derive(Debug, Clone)]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix millis at which the access token expires.
    pub expiry_ms: i64,
}

/// Specification of a calendar event to create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSpec {
    pub summary: String,
    pub description: Option<String>,
    /// RFC3339 start of the event.
    pub start_time: String,
    /// RFC3339 end of the event.
    pub end_time: String,
    /// IANA timezone the event is anchored to.
    pub time_zone: String,
    /// Attendee email addresses. Invitees receive native calendar
    /// notifications (events are created with send-updates-to-all).
    pub attendees: Vec<String>,
    /// Ask the provider to auto-create a video-conference link.
    pub request_conference: bool,
    /// Popup reminder offsets, minutes before the event.
    pub reminder_minutes: Vec<i64>,
}

/// Result of creating a calendar event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResult {
    pub event_id: Option<String>,
    pub status: String,
    /// Conference link, when one was requested and granted.
    pub meeting_link: Option<String>,
}

/// Operations the scheduling core needs from a calendar provider.
///
/// The access token is passed per call: credentials belong to individual
/// users, not to the service.
pub trait CalendarService: Send + Sync {
    /// Busy intervals for a calendar within `[start_time, end_time)`.
    #[allow(clippy::type_complexity)]
    fn get_busy_times(
        &self,
        access_token: &str,
        calendar_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<(DateTime<Utc>, DateTime<Utc>)>, SchedulingError>;

    /// Create a calendar event and notify all attendees.
    fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        spec: EventSpec,
    ) -> BoxFuture<'_, EventResult, SchedulingError>;
}

/// Exchanges a refresh token for new credentials at the provider.
///
/// Split from [`CalendarService`] so the token store can refresh without
/// depending on the full calendar surface.
pub trait TokenRefresher: Send + Sync {
    fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> BoxFuture<'_, TokenData, SchedulingError>;
}

/// Result of a notification dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub id: String,
    pub status: String,
}

/// Contract for the mail dispatcher: send or report failure.
pub trait EmailService: Send + Sync {
    fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> BoxFuture<'_, NotificationResult, SchedulingError>;
}
