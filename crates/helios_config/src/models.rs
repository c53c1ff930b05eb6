// --- File: crates/helios_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

// --- Database Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g., DATABASE_URL loaded via HELIOS_DATABASE__URL
}

// --- Google OAuth client credential set ---
// One entry per registered OAuth client. Several clients can be configured to
// spread connected users across per-client quota limits.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OAuthClientConfig {
    /// Stable name used to tie a stored connection back to its client.
    pub name: String,
    pub client_id: String,
    // Secret loaded via env override: HELIOS_GOOGLE__OAUTH_CLIENTS__<n>__CLIENT_SECRET
    pub client_secret: String,
    /// How many connected users this client is sized for.
    pub max_users: u32,
}

// --- Google Calendar / OAuth Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoogleConfig {
    /// Redirect URI registered with every OAuth client.
    pub redirect_uri: String,
    /// Frontend calendar-settings page the OAuth callback redirects back to.
    pub settings_url: String,
    /// Calendar used for event creation and free/busy queries.
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    pub oauth_clients: Vec<OAuthClientConfig>,
    /// Base64-encoded 32-byte key for sealing stored tokens.
    /// Loaded via env override: HELIOS_GOOGLE__TOKEN_ENCRYPTION_KEY
    pub token_encryption_key: String,
    /// Secret for the HMAC tag on OAuth state tokens.
    /// Loaded via env override: HELIOS_GOOGLE__STATE_SECRET
    pub state_secret: String,
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

// --- Scheduling Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchedulingConfig {
    /// Bookable slot size in minutes.
    #[serde(default = "default_slot_duration")]
    pub slot_duration_minutes: i64,
    /// Tokens expiring within this window are refreshed before use.
    #[serde(default = "default_refresh_window")]
    pub token_refresh_window_minutes: i64,
    /// Upper bound on any single call to the calendar provider.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_seconds: u64,
    /// Company name used in event summaries and notification mails.
    pub company_name: String,
}

fn default_slot_duration() -> i64 {
    30
}
fn default_refresh_window() -> i64 {
    5
}
fn default_provider_timeout() -> u64 {
    10
}

// --- Email Config ---
// Non-secret mail dispatch settings. API token loaded from env.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    // Loaded via env override: HELIOS_EMAIL__API_TOKEN
    pub api_token: String,
    pub from_address: String,
}

// --- Unified Application Config ---
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub google: GoogleConfig,
    pub scheduling: SchedulingConfig,
    pub email: Option<EmailConfig>,
}
