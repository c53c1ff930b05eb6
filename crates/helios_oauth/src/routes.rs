// --- File: crates/helios_oauth/src/routes.rs ---

use crate::handlers::{callback_handler, connect_handler, GoogleAuthState};
use axum::{routing::get, Router};
use std::sync::Arc;

/// Router for the Google OAuth connect/callback flow.
pub fn routes(state: Arc<GoogleAuthState>) -> Router {
    Router::new()
        .route("/auth/google/connect", get(connect_handler))
        .route("/auth/google/callback", get(callback_handler))
        .with_state(state)
}
