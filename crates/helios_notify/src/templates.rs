// --- File: crates/helios_notify/src/templates.rs ---
//! Mail bodies for booking notifications.
//!
//! Templates are pure string builders; the dispatcher decides delivery.
//! Attendees also get the provider's native calendar invitation, so these
//! mails carry the human-readable summary and the meeting link.

/// Everything the booking mails need to say.
#[derive(Debug, Clone)]
pub struct InterviewDetails {
    pub job_title: String,
    pub company_name: String,
    pub applicant_name: String,
    pub recruiter_name: String,
    pub sales_rep_name: String,
    /// Formatted local date, e.g. "Friday, March 15, 2024".
    pub date: String,
    /// Formatted local time with zone, e.g. "14:00 (Europe/Zurich)".
    pub time: String,
    pub duration_minutes: i64,
    pub meeting_link: Option<String>,
}

fn meeting_line(details: &InterviewDetails) -> String {
    match &details.meeting_link {
        Some(link) => format!("<p>Join the interview: <a href=\"{link}\">{link}</a></p>"),
        None => "<p>The video link will be shared in your calendar invitation.</p>".to_string(),
    }
}

/// Invitation mail for the applicant.
pub fn applicant_invitation(details: &InterviewDetails) -> (String, String) {
    let subject = format!(
        "Interview scheduled: {} at {}",
        details.job_title, details.company_name
    );
    let body = format!(
        "<p>Hi {},</p>\
         <p>Your interview for the <strong>{}</strong> position at {} has been scheduled.</p>\
         <p><strong>{}</strong> at <strong>{}</strong> ({} minutes)</p>\
         {}\
         <p>You will meet {} and {}. Good luck!</p>",
        details.applicant_name,
        details.job_title,
        details.company_name,
        details.date,
        details.time,
        details.duration_minutes,
        meeting_line(details),
        details.recruiter_name,
        details.sales_rep_name,
    );
    (subject, body)
}

/// Confirmation mail for an interviewer (recruiter or sales representative).
pub fn interviewer_confirmation(
    details: &InterviewDetails,
    interviewer_name: &str,
) -> (String, String) {
    let subject = format!(
        "Interview booked: {} with {}",
        details.job_title, details.applicant_name
    );
    let body = format!(
        "<p>Hi {},</p>\
         <p>An interview with <strong>{}</strong> for the {} position has been added to your calendar.</p>\
         <p><strong>{}</strong> at <strong>{}</strong> ({} minutes)</p>\
         {}",
        interviewer_name,
        details.applicant_name,
        details.job_title,
        details.date,
        details.time,
        details.duration_minutes,
        meeting_line(details),
    );
    (subject, body)
}
