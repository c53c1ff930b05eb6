// --- File: crates/services/helios_backend/src/app_state.rs ---
//! Wires configuration, database, gateway and services into the shared
//! state each router needs.

use helios_common::services::{CalendarService, EmailService, TokenRefresher};
use helios_common::SchedulingError;
use helios_config::AppConfig;
use helios_db::repositories::{
    CalendarConnectionRepository, JobRepository, NotificationRepository, ProfileRepository,
    ScheduledInterviewRepository, SqlCalendarConnectionRepository, SqlJobRepository,
    SqlNotificationRepository, SqlProfileRepository, SqlScheduledInterviewRepository,
};
use helios_db::DbClient;
use helios_gcal::client::GoogleCalendarGateway;
use helios_notify::{HttpEmailService, LogOnlyEmailService};
use helios_oauth::handlers::GoogleAuthState;
use helios_oauth::{AesGcmTokenCipher, OAuthRegistry, StateCodec, TokenCipher, TokenStore};
use helios_scheduling::handlers::SchedulingState;
use helios_scheduling::{AvailabilityResolver, BookingOrchestrator};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct AppState {
    pub google_auth: Arc<GoogleAuthState>,
    pub scheduling: Arc<SchedulingState>,
}

pub async fn build(config: Arc<AppConfig>) -> Result<AppState, SchedulingError> {
    let db = DbClient::new(&config).await?;

    let connections: Arc<dyn CalendarConnectionRepository> =
        Arc::new(SqlCalendarConnectionRepository::new(db.clone()));
    let interviews: Arc<dyn ScheduledInterviewRepository> =
        Arc::new(SqlScheduledInterviewRepository::new(db.clone()));
    let notifications: Arc<dyn NotificationRepository> =
        Arc::new(SqlNotificationRepository::new(db.clone()));
    let profiles: Arc<dyn ProfileRepository> = Arc::new(SqlProfileRepository::new(db.clone()));
    let jobs: Arc<dyn JobRepository> = Arc::new(SqlJobRepository::new(db.clone()));

    connections.init_schema().await?;
    interviews.init_schema().await?;
    notifications.init_schema().await?;
    profiles.init_schema().await?;
    jobs.init_schema().await?;

    let registry = Arc::new(OAuthRegistry::from_config(&config.google)?);
    let codec = StateCodec::new(&config.google.state_secret);
    let cipher: Arc<dyn TokenCipher> =
        Arc::new(AesGcmTokenCipher::from_base64_key(&config.google.token_encryption_key)?);

    let provider_timeout = Duration::from_secs(config.scheduling.provider_timeout_seconds);
    let gateway = Arc::new(GoogleCalendarGateway::new(provider_timeout).map_err(
        |e| SchedulingError::Config(format!("Calendar gateway init failed: {e}")),
    )?);
    let refresher: Arc<dyn TokenRefresher> = gateway.clone();
    let calendar: Arc<dyn CalendarService> = gateway.clone();

    let token_store = Arc::new(TokenStore::new(
        connections.clone(),
        registry.clone(),
        refresher,
        cipher,
        config.scheduling.token_refresh_window_minutes,
    ));

    let email: Arc<dyn EmailService> = match &config.email {
        Some(email_config) => Arc::new(HttpEmailService::new(
            email_config.clone(),
            provider_timeout,
        )?),
        None => {
            info!("No mail API configured; notification mails will be logged only");
            Arc::new(LogOnlyEmailService)
        }
    };

    let resolver = Arc::new(AvailabilityResolver::new(
        profiles.clone(),
        token_store.clone(),
        calendar.clone(),
        config.google.calendar_id.clone(),
        config.scheduling.slot_duration_minutes,
    ));
    let orchestrator = Arc::new(BookingOrchestrator::new(
        interviews,
        notifications,
        profiles,
        jobs,
        token_store.clone(),
        calendar,
        email,
        config.google.calendar_id.clone(),
        config.scheduling.company_name.clone(),
    ));

    let google_auth = Arc::new(GoogleAuthState {
        config: config.clone(),
        registry,
        codec,
        gateway,
        token_store: token_store.clone(),
        connections,
    });
    let scheduling = Arc::new(SchedulingState {
        resolver,
        orchestrator,
        token_store,
    });

    Ok(AppState {
        google_auth,
        scheduling,
    })
}
