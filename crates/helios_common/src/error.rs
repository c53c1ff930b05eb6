// --- File: crates/helios_common/src/error.rs ---
//! The shared error taxonomy for the scheduling core.
//!
//! Provider and network failures are caught at the gateway boundary and
//! re-thrown as one of these kinds; UI-facing handlers only ever see typed
//! errors with a human-readable detail string, never a raw provider error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulingError {
    /// OAuth state token missing, malformed, tampered with, or expired.
    /// The user must restart consent.
    #[error("Invalid OAuth state: {0}")]
    InvalidState(String),

    /// Callback client_id matched no registered OAuth client. A configuration
    /// anomaly, fatal for that callback.
    #[error("Unknown OAuth client: {0}")]
    UnknownClient(String),

    /// The provider rejected the authorization code or returned incomplete
    /// tokens (e.g., no refresh token on first consent).
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// One or both booking participants lack a calendar connection.
    #[error("Calendar connection required for: {}", missing.join(", "))]
    RequiresConnection { missing: Vec<String> },

    /// The provider failed while creating the calendar event. Triggers the
    /// compensating delete of the interview row.
    #[error("Calendar event creation failed: {0}")]
    CalendarEventCreationFailed(String),

    /// The refresh-token grant failed, commonly `invalid_grant` after the
    /// user revoked access externally. Reads as a lost connection.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// A notification send failed. Best-effort relative to the booking.
    #[error("Notification dispatch failed: {0}")]
    NotificationDispatchFailed(String),

    /// The provider rejected credentials (401 / invalid token). Eligible for
    /// the token store's single refresh-and-retry.
    #[error("Provider rejected credentials: {0}")]
    AuthRejected(String),

    /// Any other provider-side failure (rate limit, 5xx, network, timeout).
    #[error("Calendar provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SchedulingError {
    /// Whether this failure is an auth rejection that a token refresh could
    /// plausibly repair.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SchedulingError::AuthRejected(_) | SchedulingError::RefreshFailed(_)
        )
    }
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for SchedulingError {
    fn status_code(&self) -> u16 {
        match self {
            SchedulingError::InvalidState(_) => 400,
            SchedulingError::UnknownClient(_) => 400,
            SchedulingError::TokenExchangeFailed(_) => 502,
            SchedulingError::RequiresConnection { .. } => 409,
            SchedulingError::CalendarEventCreationFailed(_) => 502,
            SchedulingError::RefreshFailed(_) => 409,
            SchedulingError::NotificationDispatchFailed(_) => 502,
            SchedulingError::AuthRejected(_) => 401,
            SchedulingError::Provider(_) => 502,
            SchedulingError::Database(_) => 500,
            SchedulingError::Config(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_rejections_are_retryable_refresh_candidates() {
        assert!(SchedulingError::AuthRejected("401".into()).is_auth_error());
        assert!(SchedulingError::RefreshFailed("invalid_grant".into()).is_auth_error());
        assert!(!SchedulingError::Provider("rate limited".into()).is_auth_error());
    }

    #[test]
    fn requires_connection_names_the_missing_parties() {
        let err = SchedulingError::RequiresConnection {
            missing: vec!["rec-1".into(), "rep-2".into()],
        };
        assert_eq!(
            err.to_string(),
            "Calendar connection required for: rec-1, rep-2"
        );
        assert_eq!(err.status_code(), 409);
    }
}
