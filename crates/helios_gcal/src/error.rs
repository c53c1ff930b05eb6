// --- File: crates/helios_gcal/src/error.rs ---

use helios_common::SchedulingError;
use thiserror::Error;

/// Errors from the Google Calendar gateway.
#[derive(Error, Debug)]
pub enum GcalError {
    /// Network-level failure, including timeouts.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the bearer token (401).
    #[error("Provider rejected credentials: {0}")]
    AuthRejected(String),

    /// The refresh grant failed with invalid_grant: access was revoked.
    #[error("Refresh grant rejected: {0}")]
    InvalidGrant(String),

    /// The code exchange was rejected (invalid or expired code).
    #[error("Code exchange rejected: {0}")]
    ExchangeRejected(String),

    /// The exchange succeeded but returned no refresh token.
    #[error("Token response missing refresh token")]
    IncompleteTokens,

    /// Any other provider-side failure.
    #[error("Provider error ({status}): {detail}")]
    Provider { status: u16, detail: String },
}

impl From<GcalError> for SchedulingError {
    fn from(err: GcalError) -> Self {
        match err {
            GcalError::AuthRejected(detail) => SchedulingError::AuthRejected(detail),
            GcalError::InvalidGrant(detail) => SchedulingError::RefreshFailed(detail),
            GcalError::ExchangeRejected(detail) => SchedulingError::TokenExchangeFailed(detail),
            GcalError::IncompleteTokens => SchedulingError::TokenExchangeFailed(
                "Provider returned no refresh token; consent must be restarted".to_string(),
            ),
            GcalError::Provider { status, detail } => {
                SchedulingError::Provider(format!("{status}: {detail}"))
            }
            GcalError::Http(e) => SchedulingError::Provider(e.to_string()),
        }
    }
}
