// --- File: crates/helios_common/src/lib.rs ---
//! Shared building blocks for the Helios scheduling core: service traits,
//! the error taxonomy, and logging setup.

pub mod error;
pub mod logging;
pub mod services;

pub use error::{HttpStatusCode, SchedulingError};
