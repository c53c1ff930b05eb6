// --- File: crates/helios_oauth/src/lib.rs ---
//! Google OAuth lifecycle: client registry, state codec, encrypted token
//! store and the connect/callback HTTP flow.

pub mod crypto;
pub mod handlers;
pub mod registry;
pub mod routes;
pub mod state;
#[cfg(test)]
mod state_test;
pub mod store;
#[cfg(test)]
mod store_test;

pub use crypto::{AesGcmTokenCipher, TokenCipher};
pub use registry::OAuthRegistry;
pub use state::{OAuthState, StateCodec, STATE_TTL_SECS};
pub use store::{TokenStore, PROVIDER_GOOGLE};
