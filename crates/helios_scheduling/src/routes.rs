// --- File: crates/helios_scheduling/src/routes.rs ---

use crate::handlers::{
    availability_handler, book_handler, connection_check_handler, SchedulingState,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Router for the scheduling endpoints.
pub fn routes(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/scheduling/availability", get(availability_handler))
        .route(
            "/scheduling/connection-check",
            post(connection_check_handler),
        )
        .route("/scheduling/book", post(book_handler))
        .with_state(state)
}
