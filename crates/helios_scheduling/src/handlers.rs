// --- File: crates/helios_scheduling/src/handlers.rs ---

use crate::availability::AvailabilityResolver;
use crate::booking::{BookingOrchestrator, BookingRequest};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::NaiveDate;
use helios_common::{HttpStatusCode, SchedulingError};
use helios_oauth::TokenStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct SchedulingState {
    pub resolver: Arc<AvailabilityResolver>,
    pub orchestrator: Arc<BookingOrchestrator>,
    pub token_store: Arc<TokenStore>,
}

fn error_status(err: &SchedulingError) -> StatusCode {
    StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub recruiter_id: String,
    pub sales_rep_id: String,
    /// YYYY-MM-DD.
    pub date: String,
}

pub async fn availability_handler(
    State(state): State<Arc<SchedulingState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<crate::availability::AvailabilityResponse>, (StatusCode, String)> {
    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d").map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid date format (YYYY-MM-DD)".to_string(),
        )
    })?;

    let response = state
        .resolver
        .get_available_slots(&query.recruiter_id, &query.sales_rep_id, date)
        .await
        .map_err(|e| {
            error!("Availability query failed: {}", e);
            (error_status(&e), e.to_string())
        })?;
    Ok(Json(response))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCheckRequest {
    pub user_ids: Vec<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCheckResponse {
    pub all_connected: bool,
    pub users_without_connection: Vec<String>,
}

pub async fn connection_check_handler(
    State(state): State<Arc<SchedulingState>>,
    Json(request): Json<ConnectionCheckRequest>,
) -> Result<Json<ConnectionCheckResponse>, (StatusCode, String)> {
    let mut users_without_connection = Vec::new();
    for user_id in &request.user_ids {
        let connected = state.token_store.has_connection(user_id).await.map_err(|e| {
            error!("Connection check failed for {}: {}", user_id, e);
            (error_status(&e), e.to_string())
        })?;
        if !connected {
            users_without_connection.push(user_id.clone());
        }
    }
    Ok(Json(ConnectionCheckResponse {
        all_connected: users_without_connection.is_empty(),
        users_without_connection,
    }))
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub interview_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    /// Present on degraded success (booked, but mails failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub async fn book_handler(
    State(state): State<Arc<SchedulingState>>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<BookingResponse>, (StatusCode, Json<Value>)> {
    let outcome = state.orchestrator.book(request).await.map_err(|e| {
        error!("Booking failed: {}", e);
        let requires_connection = matches!(e, SchedulingError::RequiresConnection { .. });
        (
            error_status(&e),
            Json(json!({
                "requiresConnection": requires_connection,
                "details": e.to_string(),
            })),
        )
    })?;

    // A fresh booking changes both parties' availability.
    state.resolver.clear_cache().await;

    let message = if outcome.notifications_sent {
        None
    } else {
        Some("Interview booked, but some notification emails could not be sent".to_string())
    };
    Ok(Json(BookingResponse {
        interview_id: outcome.interview_id,
        meeting_link: outcome.meeting_link,
        message,
    }))
}
