// --- File: crates/helios_scheduling/src/booking.rs ---
//! Booking orchestration: the only component that performs compensating
//! deletes.
//!
//! A booking attempt walks Init -> ConnectionVerified ->
//! InterviewRecordCreated -> CalendarEventCreated -> NotificationsSent ->
//! Committed. The interview row is the transaction's pivot: once inserted,
//! a calendar-event failure deletes it again. Notification failures do NOT
//! roll the booking back; they downgrade the outcome to a degraded success,
//! since undoing a live calendar event over a mail hiccup would cost more
//! than the missing mail.

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use helios_common::services::{CalendarService, EmailService, EventResult, EventSpec};
use helios_common::SchedulingError;
use helios_db::repositories::{
    JobRecord, JobRepository, NotificationRecord, NotificationRepository, ProfileRepository,
    ScheduledInterview, ScheduledInterviewRepository, UserProfile, STATUS_SCHEDULED,
};
use helios_notify::{applicant_invitation, interviewer_confirmation, InterviewDetails};
use helios_oauth::TokenStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Reminder offsets on the created event: 1 day, 2 hours, 30 minutes.
const REMINDER_MINUTES: [i64; 3] = [1440, 120, 30];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub job_id: String,
    pub applicant_id: String,
    pub recruiter_id: String,
    pub sales_rep_id: String,
    /// YYYY-MM-DD in the recruiter's timezone.
    pub date: String,
    /// Slot start, HH:MM 24h, in the recruiter's timezone.
    pub time: String,
    pub duration_minutes: i64,
    /// The invitation notification this booking answers, if any; marked read
    /// on success.
    #[serde(default)]
    pub notification_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingOutcome {
    pub interview_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    /// False when the booking succeeded but one or more mails did not go
    /// out; the caller surfaces this as a degraded success.
    pub notifications_sent: bool,
}

pub struct BookingOrchestrator {
    interviews: Arc<dyn ScheduledInterviewRepository>,
    notifications: Arc<dyn NotificationRepository>,
    profiles: Arc<dyn ProfileRepository>,
    jobs: Arc<dyn JobRepository>,
    token_store: Arc<TokenStore>,
    calendar: Arc<dyn CalendarService>,
    email: Arc<dyn EmailService>,
    calendar_id: String,
    company_name: String,
}

impl BookingOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        interviews: Arc<dyn ScheduledInterviewRepository>,
        notifications: Arc<dyn NotificationRepository>,
        profiles: Arc<dyn ProfileRepository>,
        jobs: Arc<dyn JobRepository>,
        token_store: Arc<TokenStore>,
        calendar: Arc<dyn CalendarService>,
        email: Arc<dyn EmailService>,
        calendar_id: String,
        company_name: String,
    ) -> Self {
        Self {
            interviews,
            notifications,
            profiles,
            jobs,
            token_store,
            calendar,
            email,
            calendar_id,
            company_name,
        }
    }

    /// Run one booking attempt to `Committed` or `RolledBack`.
    pub async fn book(&self, request: BookingRequest) -> Result<BookingOutcome, SchedulingError> {
        // Step 1: both interviewers need an active connection before any
        // write happens.
        let mut missing = Vec::new();
        for user_id in [&request.recruiter_id, &request.sales_rep_id] {
            if !self.token_store.has_connection(user_id).await? {
                missing.push(user_id.clone());
            }
        }
        if !missing.is_empty() {
            return Err(SchedulingError::RequiresConnection { missing });
        }

        let job = self.require_job(&request.job_id).await?;
        let recruiter = self.require_profile(&request.recruiter_id).await?;
        let sales_rep = self.require_profile(&request.sales_rep_id).await?;
        let applicant = self.require_profile(&request.applicant_id).await?;
        let spec = self.event_spec(&request, &job, &recruiter, &sales_rep, &applicant)?;

        // Step 2: the pivot row. Every failure past this point must remove it.
        let interview_id = self
            .interviews
            .create(ScheduledInterview {
                id: None,
                job_id: request.job_id.clone(),
                applicant_id: request.applicant_id.clone(),
                recruiter_id: request.recruiter_id.clone(),
                sales_rep_id: request.sales_rep_id.clone(),
                scheduled_date: request.date.clone(),
                scheduled_time: request.time.clone(),
                duration_minutes: request.duration_minutes,
                status: STATUS_SCHEDULED.to_string(),
                meeting_link: None,
            })
            .await?;
        info!("Interview {} created for job {}", interview_id, request.job_id);

        // Step 3: the calendar event, on the recruiter's calendar. A timeout
        // counts as a failure and rolls back like any other.
        let event = match self.create_event(&request.recruiter_id, spec).await {
            Ok(event) => event,
            Err(e) => {
                self.roll_back(interview_id).await;
                return Err(classify_event_failure(e, &request.recruiter_id));
            }
        };

        // Step 4: meeting-link backfill, non-fatal.
        if let Some(link) = &event.meeting_link {
            if let Err(e) = self.interviews.set_meeting_link(interview_id, link).await {
                warn!(
                    "Meeting link backfill failed for interview {}: {}",
                    interview_id, e
                );
            }
        }

        // Step 5: best-effort notifications.
        let notifications_sent = self
            .dispatch_notifications(&request, &job, &recruiter, &sales_rep, &applicant, &event)
            .await;

        info!(
            "Booking committed: interview {} (notifications_sent={})",
            interview_id, notifications_sent
        );
        Ok(BookingOutcome {
            interview_id,
            meeting_link: event.meeting_link,
            notifications_sent,
        })
    }

    async fn require_profile(&self, user_id: &str) -> Result<UserProfile, SchedulingError> {
        self.profiles
            .find_profile(user_id)
            .await?
            .ok_or_else(|| SchedulingError::Database(format!("No profile for user {user_id}")))
    }

    async fn require_job(&self, job_id: &str) -> Result<JobRecord, SchedulingError> {
        self.jobs
            .find_job(job_id)
            .await?
            .ok_or_else(|| SchedulingError::Database(format!("No job record for {job_id}")))
    }

    fn event_spec(
        &self,
        request: &BookingRequest,
        job: &JobRecord,
        recruiter: &UserProfile,
        sales_rep: &UserProfile,
        applicant: &UserProfile,
    ) -> Result<EventSpec, SchedulingError> {
        let tz: Tz = recruiter.timezone.parse().map_err(|_| {
            SchedulingError::Config(format!(
                "Invalid timezone '{}' for user {}",
                recruiter.timezone, recruiter.user_id
            ))
        })?;
        let date = NaiveDate::parse_from_str(&request.date, "%Y-%m-%d")
            .map_err(|_| SchedulingError::Config(format!("Invalid date '{}'", request.date)))?;
        let time = NaiveTime::parse_from_str(&request.time, "%H:%M")
            .map_err(|_| SchedulingError::Config(format!("Invalid time '{}'", request.time)))?;

        let start = tz
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .ok_or_else(|| {
                SchedulingError::Config(format!(
                    "Slot {} {} does not exist in {}",
                    request.date, request.time, tz
                ))
            })?;
        let end = start + Duration::minutes(request.duration_minutes);

        Ok(EventSpec {
            summary: format!(
                "{} interview: {} ({})",
                job.title, applicant.full_name, self.company_name
            ),
            description: Some(format!(
                "Interview for the {} position at {}.\nInterviewers: {} and {}.",
                job.title, self.company_name, recruiter.full_name, sales_rep.full_name
            )),
            start_time: start.to_rfc3339(),
            end_time: end.to_rfc3339(),
            time_zone: recruiter.timezone.clone(),
            attendees: vec![
                recruiter.email.clone(),
                sales_rep.email.clone(),
                applicant.email.clone(),
            ],
            request_conference: true,
            reminder_minutes: REMINDER_MINUTES.to_vec(),
        })
    }

    async fn create_event(
        &self,
        recruiter_id: &str,
        spec: EventSpec,
    ) -> Result<EventResult, SchedulingError> {
        self.token_store
            .with_fresh_tokens(recruiter_id, |access_token| {
                self.calendar
                    .create_event(&access_token, &self.calendar_id, spec.clone())
            })
            .await
    }

    /// Compensating delete of the pivot row. A failed delete is logged loudly
    /// but cannot change the outcome the caller sees.
    async fn roll_back(&self, interview_id: i64) {
        match self.interviews.delete(interview_id).await {
            Ok(true) => info!("Rolled back interview {}", interview_id),
            Ok(false) => error!("Rollback found no interview row {}", interview_id),
            Err(e) => error!("Rollback failed for interview {}: {}", interview_id, e),
        }
    }

    /// Send the three booking mails concurrently, mark the answered
    /// invitation read and leave the recruiter an in-app notification.
    /// Returns whether every send succeeded.
    async fn dispatch_notifications(
        &self,
        request: &BookingRequest,
        job: &JobRecord,
        recruiter: &UserProfile,
        sales_rep: &UserProfile,
        applicant: &UserProfile,
        event: &EventResult,
    ) -> bool {
        let details = InterviewDetails {
            job_title: job.title.clone(),
            company_name: self.company_name.clone(),
            applicant_name: applicant.full_name.clone(),
            recruiter_name: recruiter.full_name.clone(),
            sales_rep_name: sales_rep.full_name.clone(),
            date: request.date.clone(),
            time: format!("{} ({})", request.time, recruiter.timezone),
            duration_minutes: request.duration_minutes,
            meeting_link: event.meeting_link.clone(),
        };

        let (applicant_subject, applicant_body) = applicant_invitation(&details);
        let (recruiter_subject, recruiter_body) =
            interviewer_confirmation(&details, &recruiter.full_name);
        let (sales_rep_subject, sales_rep_body) =
            interviewer_confirmation(&details, &sales_rep.full_name);

        let (to_applicant, to_recruiter, to_sales_rep) = tokio::join!(
            self.email
                .send_email(&applicant.email, &applicant_subject, &applicant_body, true),
            self.email
                .send_email(&recruiter.email, &recruiter_subject, &recruiter_body, true),
            self.email
                .send_email(&sales_rep.email, &sales_rep_subject, &sales_rep_body, true),
        );

        let mut all_sent = true;
        for (recipient, result) in [
            (&applicant.email, to_applicant),
            (&recruiter.email, to_recruiter),
            (&sales_rep.email, to_sales_rep),
        ] {
            if let Err(e) = result {
                error!("Booking mail to {} failed: {}", recipient, e);
                all_sent = false;
            }
        }

        if let Some(notification_id) = request.notification_id {
            if let Err(e) = self.notifications.mark_read(notification_id).await {
                warn!(
                    "Failed to mark notification {} read: {}",
                    notification_id, e
                );
            }
        }
        if let Err(e) = self
            .notifications
            .insert(NotificationRecord {
                id: None,
                user_id: request.recruiter_id.clone(),
                kind: "interview_scheduled".to_string(),
                body: format!(
                    "Interview with {} booked for {} at {}",
                    applicant.full_name, request.date, request.time
                ),
                read: false,
            })
            .await
        {
            warn!("Failed to record booking notification: {}", e);
        }

        all_sent
    }
}

/// Map a step-3 failure onto the caller-facing taxonomy: a connection that
/// turned out to be dead reads as `RequiresConnection`, everything else as
/// an event-creation failure carrying the provider detail.
fn classify_event_failure(err: SchedulingError, recruiter_id: &str) -> SchedulingError {
    if err.is_auth_error() {
        return SchedulingError::RequiresConnection {
            missing: vec![recruiter_id.to_string()],
        };
    }
    match err {
        SchedulingError::RequiresConnection { missing } => {
            SchedulingError::RequiresConnection { missing }
        }
        other => SchedulingError::CalendarEventCreationFailed(other.to_string()),
    }
}
