// --- File: crates/helios_gcal/src/service.rs ---
//! Trait implementations binding the gateway to the shared service seams.

use crate::client::GoogleCalendarGateway;
use chrono::{DateTime, Utc};
use helios_common::services::{
    BoxFuture, CalendarService, EventResult, EventSpec, TokenData, TokenRefresher,
};
use helios_common::SchedulingError;

impl CalendarService for GoogleCalendarGateway {
    fn get_busy_times(
        &self,
        access_token: &str,
        calendar_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<(DateTime<Utc>, DateTime<Utc>)>, SchedulingError> {
        let access_token = access_token.to_string();
        let calendar_id = calendar_id.to_string();
        Box::pin(async move {
            self.query_free_busy(&access_token, &calendar_id, start_time, end_time)
                .await
                .map_err(SchedulingError::from)
        })
    }

    fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        spec: EventSpec,
    ) -> BoxFuture<'_, EventResult, SchedulingError> {
        let access_token = access_token.to_string();
        let calendar_id = calendar_id.to_string();
        Box::pin(async move {
            GoogleCalendarGateway::create_event(self, &access_token, &calendar_id, &spec)
                .await
                .map_err(SchedulingError::from)
        })
    }
}

impl TokenRefresher for GoogleCalendarGateway {
    fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> BoxFuture<'_, TokenData, SchedulingError> {
        let client_id = client_id.to_string();
        let client_secret = client_secret.to_string();
        let refresh_token = refresh_token.to_string();
        Box::pin(async move {
            let tokens = self
                .refresh_access_token(&client_id, &client_secret, &refresh_token)
                .await
                .map_err(SchedulingError::from)?;
            Ok(TokenData {
                access_token: tokens.access_token,
                // The provider only rotates the refresh token occasionally;
                // keep the old one when no replacement arrives.
                refresh_token: tokens.refresh_token.unwrap_or(refresh_token),
                expiry_ms: tokens.expiry_ms,
            })
        })
    }
}
