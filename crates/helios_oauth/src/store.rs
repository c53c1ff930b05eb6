// --- File: crates/helios_oauth/src/store.rs ---
//! Token store and refresh manager.
//!
//! Owns the calendar connection rows: no other component reads raw token
//! bytes. Reads are refresh-ahead (a token expiring within the safety window
//! is refreshed before being handed out), and refresh is serialized per user
//! so two concurrent refreshes cannot race and invalidate each other's new
//! refresh token.

use crate::crypto::TokenCipher;
use crate::registry::OAuthRegistry;
use chrono::Utc;
use helios_common::services::{TokenData, TokenRefresher};
use helios_common::SchedulingError;
use helios_db::repositories::{CalendarConnection, CalendarConnectionRepository};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const PROVIDER_GOOGLE: &str = "google";

pub struct TokenStore {
    connections: Arc<dyn CalendarConnectionRepository>,
    registry: Arc<OAuthRegistry>,
    refresher: Arc<dyn TokenRefresher>,
    cipher: Arc<dyn TokenCipher>,
    /// Tokens expiring within this many milliseconds are refreshed on read.
    refresh_window_ms: i64,
    refresh_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenStore {
    pub fn new(
        connections: Arc<dyn CalendarConnectionRepository>,
        registry: Arc<OAuthRegistry>,
        refresher: Arc<dyn TokenRefresher>,
        cipher: Arc<dyn TokenCipher>,
        refresh_window_minutes: i64,
    ) -> Self {
        Self {
            connections,
            registry,
            refresher,
            cipher,
            refresh_window_ms: refresh_window_minutes * 60 * 1000,
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the user has a stored calendar connection.
    pub async fn has_connection(&self, user_id: &str) -> Result<bool, SchedulingError> {
        Ok(self
            .connections
            .find_by_user(user_id, PROVIDER_GOOGLE)
            .await?
            .is_some())
    }

    /// Read the user's credentials, refreshing first when they expire within
    /// the safety window so a token is never handed out mid-expiry.
    pub async fn get_tokens(&self, user_id: &str) -> Result<Option<TokenData>, SchedulingError> {
        let Some(row) = self.connections.find_by_user(user_id, PROVIDER_GOOGLE).await? else {
            return Ok(None);
        };

        let tokens = self.open_row(&row)?;
        if !self.expires_soon(tokens.expiry_ms) {
            return Ok(Some(tokens));
        }

        // Critical section per user: re-read after acquiring the lock since a
        // concurrent caller may have refreshed already.
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let Some(row) = self.connections.find_by_user(user_id, PROVIDER_GOOGLE).await? else {
            return Ok(None);
        };
        let tokens = self.open_row(&row)?;
        if !self.expires_soon(tokens.expiry_ms) {
            return Ok(Some(tokens));
        }

        debug!("Access token for {} expires soon; refreshing ahead", user_id);
        let refreshed = self.refresh_row(&row, &tokens).await?;
        Ok(Some(refreshed))
    }

    /// Encrypt and upsert the user's credentials.
    pub async fn save_tokens(
        &self,
        user_id: &str,
        config_name: &str,
        tokens: &TokenData,
    ) -> Result<(), SchedulingError> {
        let row = CalendarConnection {
            id: None,
            user_id: user_id.to_string(),
            provider: PROVIDER_GOOGLE.to_string(),
            access_token: self.cipher.encrypt(&tokens.access_token)?,
            refresh_token: self.cipher.encrypt(&tokens.refresh_token)?,
            token_expiry_ms: tokens.expiry_ms,
            encrypted: true,
            oauth_config_name: config_name.to_string(),
        };
        self.connections.upsert(row).await?;
        Ok(())
    }

    /// Run `op` with a fresh access token. On an auth-type failure from the
    /// operation, refresh once and retry once; a second failure propagates.
    /// The single-retry policy bounds retry storms against a provider that
    /// has truly revoked access.
    pub async fn with_fresh_tokens<T, F, Fut>(
        &self,
        user_id: &str,
        op: F,
    ) -> Result<T, SchedulingError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, SchedulingError>> + Send,
    {
        let tokens = self
            .get_tokens(user_id)
            .await?
            .ok_or_else(|| SchedulingError::RequiresConnection {
                missing: vec![user_id.to_string()],
            })?;

        match op(tokens.access_token.clone()).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_auth_error() => {
                warn!(
                    "Credentials rejected for {}; refreshing and retrying once: {}",
                    user_id, err
                );
                let lock = self.user_lock(user_id).await;
                let _guard = lock.lock().await;

                let row = self
                    .connections
                    .find_by_user(user_id, PROVIDER_GOOGLE)
                    .await?
                    .ok_or_else(|| SchedulingError::RequiresConnection {
                        missing: vec![user_id.to_string()],
                    })?;
                let current = self.open_row(&row)?;
                let refreshed = self.refresh_row(&row, &current).await?;
                drop(_guard);

                op(refreshed.access_token).await
            }
            Err(err) => Err(err),
        }
    }

    /// Maintenance sweep: refresh every connection expiring within the safety
    /// window. Failures are logged per user and do not abort the sweep.
    /// Not part of the interactive path.
    pub async fn refresh_expiring_connections(&self) -> Result<usize, SchedulingError> {
        let cutoff = Utc::now().timestamp_millis() + self.refresh_window_ms;
        let expiring = self.connections.list_expiring(cutoff).await?;

        let mut refreshed = 0;
        for row in expiring {
            let user_id = row.user_id.clone();
            let lock = self.user_lock(&user_id).await;
            let _guard = lock.lock().await;

            let result = match self.open_row(&row) {
                Ok(tokens) => self.refresh_row(&row, &tokens).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => refreshed += 1,
                Err(e) => warn!("Sweep refresh failed for {}: {}", user_id, e),
            }
        }

        info!("Refreshed {} expiring connections", refreshed);
        Ok(refreshed)
    }

    /// Decrypt a stored row into its in-memory token view. Rows written
    /// before encryption rolled out carry `encrypted = false` and are read
    /// as-is; the next save seals them.
    fn open_row(&self, row: &CalendarConnection) -> Result<TokenData, SchedulingError> {
        let (access_token, refresh_token) = if row.encrypted {
            (
                self.cipher.decrypt(&row.access_token)?,
                self.cipher.decrypt(&row.refresh_token)?,
            )
        } else {
            (row.access_token.clone(), row.refresh_token.clone())
        };
        Ok(TokenData {
            access_token,
            refresh_token,
            expiry_ms: row.token_expiry_ms,
        })
    }

    fn expires_soon(&self, expiry_ms: i64) -> bool {
        expiry_ms - Utc::now().timestamp_millis() < self.refresh_window_ms
    }

    /// Refresh the row's credentials at the provider and persist the result.
    /// Callers must hold the user's refresh lock.
    async fn refresh_row(
        &self,
        row: &CalendarConnection,
        current: &TokenData,
    ) -> Result<TokenData, SchedulingError> {
        let config = self
            .registry
            .resolve_by_name(&row.oauth_config_name)
            .ok_or_else(|| {
                SchedulingError::Config(format!(
                    "Stored connection references unknown OAuth client: {}",
                    row.oauth_config_name
                ))
            })?;

        let refreshed = self
            .refresher
            .refresh(&config.client_id, &config.client_secret, &current.refresh_token)
            .await?;

        self.save_tokens(&row.user_id, &row.oauth_config_name, &refreshed)
            .await?;
        Ok(refreshed)
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
