// --- File: crates/helios_gcal/src/lib.rs ---
// Declare modules within this crate
pub mod client;
#[cfg(test)]
mod client_test;
pub mod error;
pub mod service;

pub use client::{GoogleCalendarGateway, GoogleTokens};
pub use error::GcalError;
