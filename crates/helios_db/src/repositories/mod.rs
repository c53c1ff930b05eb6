//! Repository implementations for the scheduling core's persisted state.

pub mod calendar_connection;
pub mod job;
pub mod notification;
pub mod profile;
pub mod scheduled_interview;

pub use calendar_connection::{
    CalendarConnection, CalendarConnectionRepository, SqlCalendarConnectionRepository,
};
pub use job::{JobRecord, JobRepository, SqlJobRepository};
pub use notification::{NotificationRecord, NotificationRepository, SqlNotificationRepository};
pub use profile::{AvailabilityWindow, ProfileRepository, SqlProfileRepository, UserProfile};
pub use scheduled_interview::{
    ScheduledInterview, ScheduledInterviewRepository, SqlScheduledInterviewRepository,
    STATUS_SCHEDULED,
};
