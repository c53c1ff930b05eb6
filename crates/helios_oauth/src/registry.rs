// --- File: crates/helios_oauth/src/registry.rs ---
//! Registry of the configured OAuth client credential sets.
//!
//! Google caps the number of users per OAuth client, so new connections are
//! spread across several registered clients. Selection happens at consent
//! time; at callback time the provider echoes the client_id back and the
//! config is re-resolved from it. A callback client_id that matches nothing
//! must reject the callback, never fall back to a default config, or tokens
//! would be stored under the wrong credential set.

use helios_common::SchedulingError;
use helios_config::{GoogleConfig, OAuthClientConfig};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct OAuthRegistry {
    clients: Vec<OAuthClientConfig>,
}

impl OAuthRegistry {
    /// Build the registry from configuration. An empty client list is a
    /// misconfiguration, fatal at startup rather than at request time.
    pub fn from_config(google: &GoogleConfig) -> Result<Self, SchedulingError> {
        if google.oauth_clients.is_empty() {
            return Err(SchedulingError::Config(
                "No OAuth clients configured".to_string(),
            ));
        }
        Ok(Self {
            clients: google.oauth_clients.clone(),
        })
    }

    /// Pick a client for a new connection: first-fit under declared capacity,
    /// in registration order. When every client is at capacity the least
    /// loaded one is used anyway, so a full registry cannot block new
    /// connections. Deterministic for a given count snapshot.
    pub fn select_available(&self, active_counts: &HashMap<String, i64>) -> &OAuthClientConfig {
        let load = |c: &OAuthClientConfig| active_counts.get(&c.name).copied().unwrap_or(0);

        if let Some(config) = self
            .clients
            .iter()
            .find(|c| load(c) < i64::from(c.max_users))
        {
            return config;
        }

        warn!("All OAuth clients at capacity; selecting least loaded");
        self.clients
            .iter()
            .min_by_key(|c| load(c))
            .unwrap_or(&self.clients[0])
    }

    pub fn resolve_by_client_id(&self, client_id: &str) -> Option<&OAuthClientConfig> {
        self.clients.iter().find(|c| c.client_id == client_id)
    }

    pub fn resolve_by_name(&self, name: &str) -> Option<&OAuthClientConfig> {
        self.clients.iter().find(|c| c.name == name)
    }
}
