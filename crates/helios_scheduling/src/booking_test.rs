use crate::booking::{BookingOrchestrator, BookingRequest};
use chrono::{DateTime, Utc};
use helios_common::services::{
    BoxFuture, CalendarService, EmailService, EventResult, EventSpec, NotificationResult,
    TokenData, TokenRefresher,
};
use helios_common::SchedulingError;
use helios_config::{GoogleConfig, OAuthClientConfig};
use helios_db::repositories::{
    CalendarConnection, CalendarConnectionRepository, JobRepository, NotificationRecord,
    NotificationRepository, ProfileRepository, ScheduledInterviewRepository,
    SqlCalendarConnectionRepository, SqlJobRepository, SqlNotificationRepository,
    SqlProfileRepository, SqlScheduledInterviewRepository,
};
use helios_db::DbClient;
use helios_oauth::{AesGcmTokenCipher, OAuthRegistry, TokenCipher, TokenStore};
use sqlx::Row;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

const MEET_LINK: &str = "https://meet.example/abc";

enum CalendarBehavior {
    Succeed { with_link: bool },
    FailProvider,
    RejectAuth,
}

struct MockCalendar {
    behavior: CalendarBehavior,
    last_spec: Mutex<Option<EventSpec>>,
}

impl MockCalendar {
    fn new(behavior: CalendarBehavior) -> Self {
        Self {
            behavior,
            last_spec: Mutex::new(None),
        }
    }
}

impl CalendarService for MockCalendar {
    fn get_busy_times(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        _start_time: DateTime<Utc>,
        _end_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<(DateTime<Utc>, DateTime<Utc>)>, SchedulingError> {
        Box::pin(async { Ok(vec![]) })
    }

    fn create_event(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        spec: EventSpec,
    ) -> BoxFuture<'_, EventResult, SchedulingError> {
        *self.last_spec.lock().unwrap() = Some(spec);
        Box::pin(async move {
            match self.behavior {
                CalendarBehavior::Succeed { with_link } => Ok(EventResult {
                    event_id: Some("evt-1".to_string()),
                    status: "confirmed".to_string(),
                    meeting_link: with_link.then(|| MEET_LINK.to_string()),
                }),
                CalendarBehavior::FailProvider => {
                    Err(SchedulingError::Provider("quota exceeded".to_string()))
                }
                CalendarBehavior::RejectAuth => {
                    Err(SchedulingError::AuthRejected("401".to_string()))
                }
            }
        })
    }
}

struct CountingEmail {
    sent: AtomicUsize,
    fail: bool,
}

impl CountingEmail {
    fn new(fail: bool) -> Self {
        Self {
            sent: AtomicUsize::new(0),
            fail,
        }
    }
}

impl EmailService for CountingEmail {
    fn send_email(
        &self,
        _to: &str,
        _subject: &str,
        _body: &str,
        _is_html: bool,
    ) -> BoxFuture<'_, NotificationResult, SchedulingError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(SchedulingError::NotificationDispatchFailed(
                    "mail API down".to_string(),
                ))
            } else {
                Ok(NotificationResult {
                    id: "msg-1".to_string(),
                    status: "sent".to_string(),
                })
            }
        })
    }
}

struct AlwaysFreshRefresher;

impl TokenRefresher for AlwaysFreshRefresher {
    fn refresh(
        &self,
        _client_id: &str,
        _client_secret: &str,
        refresh_token: &str,
    ) -> BoxFuture<'_, TokenData, SchedulingError> {
        let refresh_token = refresh_token.to_string();
        Box::pin(async move {
            Ok(TokenData {
                access_token: "refreshed-access".to_string(),
                refresh_token,
                expiry_ms: Utc::now().timestamp_millis() + 3600 * 1000,
            })
        })
    }
}

fn registry() -> Arc<OAuthRegistry> {
    let google = GoogleConfig {
        redirect_uri: "https://app.example.com/api/auth/google/callback".to_string(),
        settings_url: "https://app.example.com/settings/calendar".to_string(),
        calendar_id: "primary".to_string(),
        oauth_clients: vec![OAuthClientConfig {
            name: "pool-a".to_string(),
            client_id: "id-a".to_string(),
            client_secret: "secret-a".to_string(),
            max_users: 50,
        }],
        token_encryption_key: "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
        state_secret: "test-state-secret".to_string(),
    };
    Arc::new(OAuthRegistry::from_config(&google).unwrap())
}

struct Fixture {
    orchestrator: BookingOrchestrator,
    calendar: Arc<MockCalendar>,
    email: Arc<CountingEmail>,
    interviews: Arc<dyn ScheduledInterviewRepository>,
    notifications: Arc<dyn NotificationRepository>,
    db: DbClient,
}

async fn fixture(calendar_behavior: CalendarBehavior, fail_email: bool) -> Fixture {
    let db = DbClient::in_memory().await.unwrap();
    let connections: Arc<dyn CalendarConnectionRepository> =
        Arc::new(SqlCalendarConnectionRepository::new(db.clone()));
    connections.init_schema().await.unwrap();
    let profiles: Arc<dyn ProfileRepository> = Arc::new(SqlProfileRepository::new(db.clone()));
    profiles.init_schema().await.unwrap();
    let interviews: Arc<dyn ScheduledInterviewRepository> =
        Arc::new(SqlScheduledInterviewRepository::new(db.clone()));
    interviews.init_schema().await.unwrap();
    let notifications: Arc<dyn NotificationRepository> =
        Arc::new(SqlNotificationRepository::new(db.clone()));
    notifications.init_schema().await.unwrap();
    let jobs: Arc<dyn JobRepository> = Arc::new(SqlJobRepository::new(db.clone()));
    jobs.init_schema().await.unwrap();

    let cipher: Arc<dyn TokenCipher> = Arc::new(
        AesGcmTokenCipher::from_base64_key("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
            .unwrap(),
    );
    let token_store = Arc::new(TokenStore::new(
        connections,
        registry(),
        Arc::new(AlwaysFreshRefresher),
        cipher,
        5,
    ));

    let calendar = Arc::new(MockCalendar::new(calendar_behavior));
    let email = Arc::new(CountingEmail::new(fail_email));
    let orchestrator = BookingOrchestrator::new(
        interviews.clone(),
        notifications.clone(),
        profiles,
        jobs,
        token_store,
        calendar.clone(),
        email.clone(),
        "primary".to_string(),
        "Helios Recruit".to_string(),
    );
    Fixture {
        orchestrator,
        calendar,
        email,
        interviews,
        notifications,
        db,
    }
}

async fn seed_participant(f: &Fixture, user_id: &str, name: &str, connected: bool) {
    f.db.execute(&format!(
        "INSERT INTO user_profiles (user_id, full_name, email, timezone) \
         VALUES ('{user_id}', '{name}', '{user_id}@example.com', 'America/New_York')"
    ))
    .await
    .unwrap();

    if connected {
        let connections = SqlCalendarConnectionRepository::new(f.db.clone());
        let cipher =
            AesGcmTokenCipher::from_base64_key("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
                .unwrap();
        connections
            .upsert(CalendarConnection {
                id: None,
                user_id: user_id.to_string(),
                provider: "google".to_string(),
                access_token: cipher.encrypt("access-token").unwrap(),
                refresh_token: cipher.encrypt("refresh-token").unwrap(),
                token_expiry_ms: Utc::now().timestamp_millis() + 3600 * 1000,
                encrypted: true,
                oauth_config_name: "pool-a".to_string(),
            })
            .await
            .unwrap();
    }
}

async fn seed_all(f: &Fixture) {
    f.db.execute("INSERT INTO jobs (job_id, title) VALUES ('job-7', 'Senior Backend Engineer')")
        .await
        .unwrap();
    seed_participant(f, "rec-1", "Jonas Weber", true).await;
    seed_participant(f, "rep-1", "Priya Shah", true).await;
    seed_participant(f, "app-1", "Dana Miller", false).await;
}

fn request() -> BookingRequest {
    BookingRequest {
        job_id: "job-7".to_string(),
        applicant_id: "app-1".to_string(),
        recruiter_id: "rec-1".to_string(),
        sales_rep_id: "rep-1".to_string(),
        date: "2024-03-15".to_string(),
        time: "10:00".to_string(),
        duration_minutes: 30,
        notification_id: None,
    }
}

async fn interview_count(f: &Fixture) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM scheduled_interviews")
        .fetch_one(f.db.pool())
        .await
        .unwrap()
        .try_get("n")
        .unwrap()
}

// The wire shape carries ids only; the job title comes from the job record.
#[test]
fn booking_request_deserializes_from_ids_only() {
    let request: BookingRequest = serde_json::from_str(
        r#"{
            "jobId": "job-7",
            "applicantId": "app-1",
            "recruiterId": "rec-1",
            "salesRepId": "rep-1",
            "date": "2024-03-15",
            "time": "10:00",
            "durationMinutes": 30
        }"#,
    )
    .unwrap();
    assert_eq!(request.job_id, "job-7");
    assert_eq!(request.duration_minutes, 30);
    assert!(request.notification_id.is_none());
}

#[tokio::test]
async fn booking_commits_and_backfills_the_meeting_link() {
    let f = fixture(CalendarBehavior::Succeed { with_link: true }, false).await;
    seed_all(&f).await;

    let outcome = f.orchestrator.book(request()).await.unwrap();
    assert_eq!(outcome.meeting_link.as_deref(), Some(MEET_LINK));
    assert!(outcome.notifications_sent);

    let interview = f
        .interviews
        .find_by_id(outcome.interview_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(interview.status, "scheduled");
    assert_eq!(interview.meeting_link.as_deref(), Some(MEET_LINK));
    assert_eq!(interview.scheduled_date, "2024-03-15");
    assert_eq!(interview.scheduled_time, "10:00");

    // All three participants got mail.
    assert_eq!(f.email.sent.load(Ordering::SeqCst), 3);

    // The recruiter got an in-app notification.
    let n: i64 = sqlx::query("SELECT COUNT(*) AS n FROM notifications WHERE user_id = 'rec-1'")
        .fetch_one(f.db.pool())
        .await
        .unwrap()
        .try_get("n")
        .unwrap();
    assert_eq!(n, 1);
}

#[tokio::test]
async fn event_spec_carries_attendees_conference_and_reminders() {
    let f = fixture(CalendarBehavior::Succeed { with_link: true }, false).await;
    seed_all(&f).await;

    f.orchestrator.book(request()).await.unwrap();

    let spec = f.calendar.last_spec.lock().unwrap().clone().unwrap();
    assert!(spec.summary.contains("Senior Backend Engineer"));
    assert!(spec.summary.contains("Dana Miller"));
    assert_eq!(
        spec.attendees,
        vec!["rec-1@example.com", "rep-1@example.com", "app-1@example.com"]
    );
    assert!(spec.request_conference);
    assert_eq!(spec.reminder_minutes, vec![1440, 120, 30]);
    assert_eq!(spec.time_zone, "America/New_York");
    // 10:00 Eastern on 2024-03-15 is EDT, UTC-4.
    assert!(spec.start_time.starts_with("2024-03-15T10:00:00-04:00"));
}

#[tokio::test]
async fn missing_connection_fails_before_any_write() {
    let f = fixture(CalendarBehavior::Succeed { with_link: true }, false).await;
    seed_participant(&f, "rec-1", "Jonas Weber", true).await;
    seed_participant(&f, "rep-1", "Priya Shah", false).await;
    seed_participant(&f, "app-1", "Dana Miller", false).await;

    let result = f.orchestrator.book(request()).await;
    match result {
        Err(SchedulingError::RequiresConnection { missing }) => {
            assert_eq!(missing, vec!["rep-1"]);
        }
        other => panic!("expected RequiresConnection, got {other:?}"),
    }
    assert_eq!(interview_count(&f).await, 0);
    assert_eq!(f.email.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn provider_failure_rolls_the_interview_back() {
    let f = fixture(CalendarBehavior::FailProvider, false).await;
    seed_all(&f).await;

    let result = f.orchestrator.book(request()).await;
    assert!(matches!(
        result,
        Err(SchedulingError::CalendarEventCreationFailed(_))
    ));
    // Atomicity: no interview row survives a failed event creation.
    assert_eq!(interview_count(&f).await, 0);
    assert_eq!(f.email.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dead_connection_reads_as_requires_connection_and_rolls_back() {
    let f = fixture(CalendarBehavior::RejectAuth, false).await;
    seed_all(&f).await;

    let result = f.orchestrator.book(request()).await;
    match result {
        Err(SchedulingError::RequiresConnection { missing }) => {
            assert_eq!(missing, vec!["rec-1"]);
        }
        other => panic!("expected RequiresConnection, got {other:?}"),
    }
    assert_eq!(interview_count(&f).await, 0);
}

#[tokio::test]
async fn mail_failure_degrades_but_does_not_roll_back() {
    let f = fixture(CalendarBehavior::Succeed { with_link: true }, true).await;
    seed_all(&f).await;

    let outcome = f.orchestrator.book(request()).await.unwrap();
    assert!(!outcome.notifications_sent);
    assert_eq!(outcome.meeting_link.as_deref(), Some(MEET_LINK));

    // The booking and the calendar event stand.
    assert_eq!(interview_count(&f).await, 1);
    assert_eq!(f.email.sent.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn booking_without_conference_link_succeeds_with_none() {
    let f = fixture(CalendarBehavior::Succeed { with_link: false }, false).await;
    seed_all(&f).await;

    let outcome = f.orchestrator.book(request()).await.unwrap();
    assert!(outcome.meeting_link.is_none());

    let interview = f
        .interviews
        .find_by_id(outcome.interview_id)
        .await
        .unwrap()
        .unwrap();
    assert!(interview.meeting_link.is_none());
}

#[tokio::test]
async fn answered_invitation_is_marked_read() {
    let f = fixture(CalendarBehavior::Succeed { with_link: true }, false).await;
    seed_all(&f).await;

    let invitation_id = f
        .notifications
        .insert(NotificationRecord {
            id: None,
            user_id: "rep-1".to_string(),
            kind: "interview_invitation".to_string(),
            body: "Please schedule an interview".to_string(),
            read: false,
        })
        .await
        .unwrap();

    let mut req = request();
    req.notification_id = Some(invitation_id);
    f.orchestrator.book(req).await.unwrap();

    let read: i64 = sqlx::query("SELECT read AS r FROM notifications WHERE id = $1")
        .bind(invitation_id)
        .fetch_one(f.db.pool())
        .await
        .unwrap()
        .try_get("r")
        .unwrap();
    assert_eq!(read, 1);
}
