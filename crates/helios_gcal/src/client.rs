// --- File: crates/helios_gcal/src/client.rs ---
//! HTTP client for Google's OAuth token endpoint and Calendar REST API.
//!
//! This gateway never retries: retry policy belongs one layer up, in the
//! token store's single refresh-and-retry and the booking orchestrator's
//! compensation. Every call is bounded by the configured provider timeout; a
//! timed-out call is indistinguishable from a failed one for callers.

use crate::error::GcalError;
use chrono::{DateTime, Utc};
use helios_config::OAuthClientConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Scopes requested at consent time: calendar read/write plus event access.
const SCOPES: &str =
    "https://www.googleapis.com/auth/calendar https://www.googleapis.com/auth/calendar.events";

/// Tokens returned by the provider's code-exchange or refresh grant.
#[derive(Debug, Clone)]
pub struct GoogleTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix millis at which the access token expires.
    pub expiry_ms: i64,
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Deserialize)]
struct TokenEndpointError {
    error: String,
    error_description: Option<String>,
}

/// Gateway to Google's OAuth and Calendar APIs.
#[derive(Debug, Clone)]
pub struct GoogleCalendarGateway {
    http: Client,
}

impl GoogleCalendarGateway {
    /// Build a gateway with the given per-call timeout.
    pub fn new(provider_timeout: Duration) -> Result<Self, GcalError> {
        let http = Client::builder()
            .timeout(provider_timeout)
            .build()
            .map_err(GcalError::Http)?;
        Ok(Self { http })
    }

    /// Build the provider consent URL for a registered OAuth client.
    ///
    /// `access_type=offline` plus `prompt=consent` forces refresh-token
    /// issuance even on re-consent; without them the provider only hands out
    /// a refresh token on the very first approval.
    pub fn consent_url(
        &self,
        config: &OAuthClientConfig,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, GcalError> {
        let params = [
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", SCOPES),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ];
        let query = serde_urlencoded::to_string(params)
            .map_err(|e| GcalError::ExchangeRejected(format!("Failed to encode query: {e}")))?;
        Ok(format!("{AUTH_ENDPOINT}?{query}"))
    }

    /// Exchange an authorization code for tokens.
    ///
    /// A response without a refresh token is incomplete: the connection could
    /// never be refreshed later, so it is rejected here rather than stored.
    pub async fn exchange_code(
        &self,
        config: &OAuthClientConfig,
        redirect_uri: &str,
        code: &str,
    ) -> Result<GoogleTokens, GcalError> {
        let params = [
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = self.http.post(TOKEN_ENDPOINT).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let detail = token_error_detail(&body);
            warn!("Code exchange rejected ({}): {}", status, detail);
            return Err(GcalError::ExchangeRejected(detail));
        }

        let tokens: TokenEndpointResponse = serde_json::from_str(&body)
            .map_err(|e| GcalError::ExchangeRejected(format!("Malformed token response: {e}")))?;

        if tokens.refresh_token.is_none() {
            return Err(GcalError::IncompleteTokens);
        }

        Ok(GoogleTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expiry_ms: expiry_from_now(tokens.expires_in),
        })
    }

    /// Perform the refresh-token grant for a registered OAuth client.
    pub async fn refresh_access_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<GoogleTokens, GcalError> {
        let params = [
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "refresh_token"),
        ];

        let response = self.http.post(TOKEN_ENDPOINT).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let detail = token_error_detail(&body);
            // invalid_grant means the user revoked access externally.
            if body.contains("invalid_grant") {
                return Err(GcalError::InvalidGrant(detail));
            }
            return Err(GcalError::Provider {
                status: status.as_u16(),
                detail,
            });
        }

        let tokens: TokenEndpointResponse = serde_json::from_str(&body)
            .map_err(|e| GcalError::Provider {
                status: status.as_u16(),
                detail: format!("Malformed refresh response: {e}"),
            })?;

        Ok(GoogleTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expiry_ms: expiry_from_now(tokens.expires_in),
        })
    }

    /// Query busy intervals for one calendar within `[time_min, time_max)`.
    pub async fn query_free_busy(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, GcalError> {
        let request = FreeBusyRequest {
            time_min: time_min.to_rfc3339(),
            time_max: time_max.to_rfc3339(),
            time_zone: "UTC".to_string(),
            items: vec![FreeBusyItem {
                id: calendar_id.to_string(),
            }],
        };

        let response = self
            .http
            .post(format!("{CALENDAR_API_BASE}/freeBusy"))
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await?;

        let body = check_api_response(response).await?;
        let parsed: FreeBusyResponse = serde_json::from_value(body).map_err(|e| {
            GcalError::Provider {
                status: 200,
                detail: format!("Malformed free/busy response: {e}"),
            }
        })?;

        Ok(parse_busy_periods(&parsed, calendar_id))
    }

    /// Create a calendar event.
    ///
    /// Events are inserted with `sendUpdates=all` so invitees receive native
    /// calendar notifications, and `conferenceDataVersion=1` so a conference
    /// create-request is honored.
    pub async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        spec: &helios_common::services::EventSpec,
    ) -> Result<helios_common::services::EventResult, GcalError> {
        let event = build_event_body(spec);
        debug!("Creating calendar event: {}", spec.summary);

        let response = self
            .http
            .post(format!(
                "{CALENDAR_API_BASE}/calendars/{calendar_id}/events"
            ))
            .query(&[("sendUpdates", "all"), ("conferenceDataVersion", "1")])
            .bearer_auth(access_token)
            .json(&event)
            .send()
            .await?;

        let body = check_api_response(response).await?;
        Ok(helios_common::services::EventResult {
            event_id: body.get("id").and_then(Value::as_str).map(String::from),
            status: body
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("confirmed")
                .to_string(),
            meeting_link: body
                .get("hangoutLink")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }
}

// --- Wire types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest {
    time_min: String,
    time_max: String,
    time_zone: String,
    items: Vec<FreeBusyItem>,
}

#[derive(Serialize)]
struct FreeBusyItem {
    id: String,
}

#[derive(Deserialize)]
pub(crate) struct FreeBusyResponse {
    calendars: Option<HashMap<String, FreeBusyCalendar>>,
}

#[derive(Deserialize)]
pub(crate) struct FreeBusyCalendar {
    busy: Option<Vec<BusyPeriod>>,
}

#[derive(Deserialize)]
pub(crate) struct BusyPeriod {
    start: Option<String>,
    end: Option<String>,
}

pub(crate) fn parse_busy_periods(
    response: &FreeBusyResponse,
    calendar_id: &str,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut busy_periods = Vec::new();
    if let Some(calendars) = &response.calendars {
        if let Some(cal_info) = calendars.get(calendar_id) {
            if let Some(busy) = &cal_info.busy {
                for period in busy {
                    match (&period.start, &period.end) {
                        (Some(start), Some(end)) => {
                            let parsed = DateTime::parse_from_rfc3339(start)
                                .and_then(|s| DateTime::parse_from_rfc3339(end).map(|e| (s, e)));
                            match parsed {
                                Ok((start_dt, end_dt)) => busy_periods.push((
                                    start_dt.with_timezone(&Utc),
                                    end_dt.with_timezone(&Utc),
                                )),
                                Err(e) => {
                                    warn!("Skipping unparseable busy period: {}", e);
                                }
                            }
                        }
                        _ => warn!("Skipping busy period with missing start/end"),
                    }
                }
            }
        }
    }
    busy_periods.sort_by_key(|k| k.0);
    busy_periods
}

pub(crate) fn build_event_body(spec: &helios_common::services::EventSpec) -> Value {
    let attendees: Vec<Value> = spec
        .attendees
        .iter()
        .map(|email| serde_json::json!({ "email": email }))
        .collect();

    let overrides: Vec<Value> = spec
        .reminder_minutes
        .iter()
        .map(|minutes| serde_json::json!({ "method": "popup", "minutes": minutes }))
        .collect();

    let mut event = serde_json::json!({
        "summary": spec.summary,
        "description": spec.description,
        "start": { "dateTime": spec.start_time, "timeZone": spec.time_zone },
        "end": { "dateTime": spec.end_time, "timeZone": spec.time_zone },
        "attendees": attendees,
        "reminders": { "useDefault": false, "overrides": overrides },
    });

    if spec.request_conference {
        event["conferenceData"] = serde_json::json!({
            "createRequest": {
                "requestId": Uuid::new_v4().to_string(),
                "conferenceSolutionKey": { "type": "hangoutsMeet" }
            }
        });
    }

    event
}

async fn check_api_response(response: reqwest::Response) -> Result<Value, GcalError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::UNAUTHORIZED {
        return Err(GcalError::AuthRejected(api_error_detail(&body)));
    }
    if !status.is_success() {
        return Err(GcalError::Provider {
            status: status.as_u16(),
            detail: api_error_detail(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| GcalError::Provider {
        status: status.as_u16(),
        detail: format!("Malformed API response: {e}"),
    })
}

fn api_error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

pub(crate) fn token_error_detail(body: &str) -> String {
    serde_json::from_str::<TokenEndpointError>(body)
        .map(|e| match e.error_description {
            Some(desc) => format!("{}: {}", e.error, desc),
            None => e.error,
        })
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

fn expiry_from_now(expires_in_secs: i64) -> i64 {
    Utc::now().timestamp_millis() + expires_in_secs * 1000
}
