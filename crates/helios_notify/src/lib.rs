// --- File: crates/helios_notify/src/lib.rs ---
//! Booking notification mails: templates plus the HTTP mail dispatcher.

pub mod service;
pub mod templates;

pub use service::{HttpEmailService, LogOnlyEmailService};
pub use templates::{applicant_invitation, interviewer_confirmation, InterviewDetails};
