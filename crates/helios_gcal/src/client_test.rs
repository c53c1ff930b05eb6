use crate::client::*;
use chrono::{TimeZone, Utc};
use helios_common::services::EventSpec;
use helios_config::OAuthClientConfig;
use std::time::Duration;

fn test_config() -> OAuthClientConfig {
    OAuthClientConfig {
        name: "pool-a".to_string(),
        client_id: "client-a.apps.googleusercontent.com".to_string(),
        client_secret: "secret".to_string(),
        max_users: 50,
    }
}

fn sample_spec() -> EventSpec {
    EventSpec {
        summary: "Interview: Helios Recruit".to_string(),
        description: Some("Screening call".to_string()),
        start_time: "2024-03-15T10:00:00-04:00".to_string(),
        end_time: "2024-03-15T10:30:00-04:00".to_string(),
        time_zone: "America/New_York".to_string(),
        attendees: vec!["rec@example.com".to_string(), "rep@example.com".to_string()],
        request_conference: true,
        reminder_minutes: vec![1440, 120, 30],
    }
}

#[test]
fn consent_url_carries_offline_access_and_forced_consent() {
    let gateway = GoogleCalendarGateway::new(Duration::from_secs(5)).unwrap();
    let url = gateway
        .consent_url(&test_config(), "https://app.example.com/auth/google/callback", "state-token")
        .unwrap();

    assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    assert!(url.contains("access_type=offline"));
    assert!(url.contains("prompt=consent"));
    assert!(url.contains("state=state-token"));
    assert!(url.contains("client_id=client-a.apps.googleusercontent.com"));
    assert!(url.contains("calendar.events"));
}

#[test]
fn event_body_includes_attendees_conference_and_reminders() {
    let body = build_event_body(&sample_spec());

    assert_eq!(body["summary"], "Interview: Helios Recruit");
    assert_eq!(body["start"]["timeZone"], "America/New_York");
    assert_eq!(body["attendees"].as_array().unwrap().len(), 2);
    assert_eq!(body["reminders"]["useDefault"], false);

    let overrides = body["reminders"]["overrides"].as_array().unwrap();
    let minutes: Vec<i64> = overrides
        .iter()
        .map(|o| o["minutes"].as_i64().unwrap())
        .collect();
    assert_eq!(minutes, vec![1440, 120, 30]);

    assert_eq!(
        body["conferenceData"]["createRequest"]["conferenceSolutionKey"]["type"],
        "hangoutsMeet"
    );
}

#[test]
fn event_body_omits_conference_when_not_requested() {
    let mut spec = sample_spec();
    spec.request_conference = false;
    let body = build_event_body(&spec);
    assert!(body.get("conferenceData").is_none());
}

#[test]
fn busy_periods_parse_sorted_and_skip_malformed() {
    let raw = serde_json::json!({
        "calendars": {
            "primary": {
                "busy": [
                    { "start": "2024-03-15T15:00:00Z", "end": "2024-03-15T16:00:00Z" },
                    { "start": "2024-03-15T13:00:00Z", "end": "2024-03-15T13:30:00Z" },
                    { "start": "not-a-time", "end": "2024-03-15T18:00:00Z" },
                    { "start": "2024-03-15T19:00:00Z" }
                ]
            }
        }
    });
    let parsed: FreeBusyResponse = serde_json::from_value(raw).unwrap();
    let busy = parse_busy_periods(&parsed, "primary");

    assert_eq!(busy.len(), 2);
    assert_eq!(busy[0].0, Utc.with_ymd_and_hms(2024, 3, 15, 13, 0, 0).unwrap());
    assert_eq!(busy[1].1, Utc.with_ymd_and_hms(2024, 3, 15, 16, 0, 0).unwrap());
}

#[test]
fn busy_periods_empty_for_unknown_calendar() {
    let parsed: FreeBusyResponse = serde_json::from_value(serde_json::json!({
        "calendars": {}
    }))
    .unwrap();
    assert!(parse_busy_periods(&parsed, "primary").is_empty());
}

#[test]
fn token_error_detail_prefers_structured_description() {
    let detail = token_error_detail(
        r#"{"error": "invalid_grant", "error_description": "Token has been revoked."}"#,
    );
    assert_eq!(detail, "invalid_grant: Token has been revoked.");

    let fallback = token_error_detail("upstream gateway exploded");
    assert_eq!(fallback, "upstream gateway exploded");
}
