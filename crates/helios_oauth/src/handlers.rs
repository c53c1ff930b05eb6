// --- File: crates/helios_oauth/src/handlers.rs ---
//! Axum handlers for the Google OAuth connect/callback flow.
//!
//! Both handlers end in a browser redirect to the settings page; the
//! callback reports its outcome only through `?success=` / `?error=` query
//! parameters so no provider detail ever reaches the user agent.

use crate::registry::OAuthRegistry;
use crate::state::StateCodec;
use crate::store::TokenStore;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use helios_common::services::TokenData;
use helios_common::SchedulingError;
use helios_config::AppConfig;
use helios_db::repositories::CalendarConnectionRepository;
use helios_gcal::client::GoogleCalendarGateway;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared state for the OAuth routes.
#[derive(Clone)]
pub struct GoogleAuthState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<OAuthRegistry>,
    pub codec: StateCodec,
    pub gateway: Arc<GoogleCalendarGateway>,
    pub token_store: Arc<TokenStore>,
    pub connections: Arc<dyn CalendarConnectionRepository>,
}

#[derive(Deserialize, Debug)]
pub struct ConnectQuery {
    pub user_id: String,
}

#[derive(Deserialize, Debug)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denies consent.
    pub error: Option<String>,
    /// Echoed by the provider; when present it must match a registered
    /// client.
    pub client_id: Option<String>,
}

fn settings_redirect(state: &GoogleAuthState, outcome: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}?{}",
        state.config.google.settings_url, outcome
    ))
}

/// Start the consent flow: pick an OAuth client, mint a state token and send
/// the browser to Google's consent screen.
pub async fn connect_handler(
    State(state): State<Arc<GoogleAuthState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<Redirect, (StatusCode, String)> {
    let counts = state.connections.count_by_config().await.map_err(|e| {
        error!("Failed to load connection counts: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start calendar connection".to_string(),
        )
    })?;

    let client = state.registry.select_available(&counts);
    let token = state
        .codec
        .encode(&query.user_id, &client.name)
        .map_err(|e| {
            error!("Failed to encode OAuth state: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to start calendar connection".to_string(),
            )
        })?;

    let consent = state
        .gateway
        .consent_url(client, &state.config.google.redirect_uri, &token)
        .map_err(|e| {
            error!("Failed to build consent URL: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to start calendar connection".to_string(),
            )
        })?;

    info!(
        "Starting Google consent flow for {} via client '{}'",
        query.user_id, client.name
    );
    Ok(Redirect::temporary(&consent))
}

/// Handle the provider redirect back from the consent screen.
///
/// Every failure mode maps to a stable `?error=` code on the settings page:
/// `auth_failed` (user denied), `invalid_request` (missing code/state),
/// `invalid_state` (tampered or expired state), `callback_failed` (code
/// exchange rejected), `save_failed` (persistence). Success is
/// `?success=connected`.
pub async fn callback_handler(
    State(state): State<Arc<GoogleAuthState>>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    if let Some(provider_error) = query.error {
        warn!("Consent denied or failed at provider: {}", provider_error);
        return settings_redirect(&state, "error=auth_failed");
    }

    let (Some(code), Some(state_token)) = (query.code, query.state) else {
        warn!("Callback missing code or state");
        return settings_redirect(&state, "error=invalid_request");
    };

    let oauth_state = match state.codec.decode(&state_token) {
        Ok(s) => s,
        Err(e) => {
            warn!("Rejected OAuth state token: {}", e);
            return settings_redirect(&state, "error=invalid_state");
        }
    };

    // The exchange must use the credential set the consent was issued
    // under: resolved from the echoed client_id when present, otherwise
    // from the state. A client_id matching no registered client is a
    // configuration anomaly; never fall back to a default config.
    let resolved = match &query.client_id {
        Some(client_id) => state.registry.resolve_by_client_id(client_id).ok_or_else(|| {
            SchedulingError::UnknownClient(client_id.clone())
        }),
        None => state
            .registry
            .resolve_by_name(&oauth_state.config_name)
            .ok_or_else(|| SchedulingError::UnknownClient(oauth_state.config_name.clone())),
    };
    let client = match resolved {
        Ok(client) => client,
        Err(e) => {
            error!("Callback rejected: {}", e);
            return settings_redirect(&state, "error=callback_failed");
        }
    };

    let tokens = match state
        .gateway
        .exchange_code(client, &state.config.google.redirect_uri, &code)
        .await
    {
        Ok(t) => t,
        Err(e) => {
            error!(
                "Code exchange failed for {}: {}",
                oauth_state.user_id, e
            );
            return settings_redirect(&state, "error=callback_failed");
        }
    };

    let Some(refresh_token) = tokens.refresh_token else {
        error!(
            "Exchange for {} returned no refresh token",
            oauth_state.user_id
        );
        return settings_redirect(&state, "error=callback_failed");
    };

    let token_data = TokenData {
        access_token: tokens.access_token,
        refresh_token,
        expiry_ms: tokens.expiry_ms,
    };
    if let Err(e) = state
        .token_store
        .save_tokens(&oauth_state.user_id, &client.name, &token_data)
        .await
    {
        error!(
            "Failed to persist tokens for {}: {}",
            oauth_state.user_id, e
        );
        return settings_redirect(&state, "error=save_failed");
    }

    info!(
        "Calendar connected for {} via client '{}'",
        oauth_state.user_id, client.name
    );
    settings_redirect(&state, "success=connected")
}
