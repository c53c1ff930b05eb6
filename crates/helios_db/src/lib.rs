//! Database access for the Helios scheduling core.
//!
//! Built on SQLx's SQLite driver. Repositories keep their queries behind
//! traits so callers never touch the pool directly; row mapping is manual.

pub mod client;
pub mod error;
pub mod repositories;

pub use client::DbClient;
pub use error::DbError;
