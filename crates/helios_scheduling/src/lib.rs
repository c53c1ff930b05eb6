// --- File: crates/helios_scheduling/src/lib.rs ---
//! Availability resolution and booking orchestration.

pub mod availability;
pub mod booking;
#[cfg(test)]
mod booking_test;
pub mod handlers;
pub mod routes;

pub use availability::{AvailabilityResolver, AvailabilityResponse, SlotCache};
pub use booking::{BookingOrchestrator, BookingOutcome, BookingRequest};
