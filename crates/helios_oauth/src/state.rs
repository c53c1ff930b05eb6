// --- File: crates/helios_oauth/src/state.rs ---
//! Tamper-evident OAuth state tokens.
//!
//! The state parameter is the CSRF/replay defense for the OAuth redirect: it
//! carries {subject user, selected config, issued-at, nonce} as URL-safe
//! base64 with an HMAC-SHA256 tag, and decoding rejects anything malformed,
//! tampered with, or older than ten minutes. The codec is a pure function
//! pair; single-use enforcement, if wanted, belongs to the caller.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as base64_engine, Engine};
use chrono::Utc;
use helios_common::SchedulingError;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a state token before decode rejects it.
pub const STATE_TTL_SECS: i64 = 600;

/// Decoded contents of a state token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuthState {
    pub user_id: String,
    pub config_name: String,
    pub issued_at_ms: i64,
    pub nonce: String,
}

/// Encoder/decoder for OAuth state tokens.
#[derive(Debug, Clone)]
pub struct StateCodec {
    secret: Vec<u8>,
}

impl StateCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Encode a fresh state token for a consent redirect.
    pub fn encode(&self, user_id: &str, config_name: &str) -> Result<String, SchedulingError> {
        self.encode_at(user_id, config_name, Utc::now().timestamp_millis())
    }

    pub(crate) fn encode_at(
        &self,
        user_id: &str,
        config_name: &str,
        issued_at_ms: i64,
    ) -> Result<String, SchedulingError> {
        let state = OAuthState {
            user_id: user_id.to_string(),
            config_name: config_name.to_string(),
            issued_at_ms,
            nonce: Uuid::new_v4().to_string(),
        };
        let payload = serde_json::to_vec(&state)
            .map_err(|e| SchedulingError::InvalidState(format!("Failed to encode state: {e}")))?;
        let tag = self.tag(&payload)?;
        Ok(format!(
            "{}.{}",
            base64_engine.encode(&payload),
            base64_engine.encode(tag)
        ))
    }

    /// Decode and validate a state token.
    ///
    /// Any failure, malformed base64, bad tag, expired timestamp, comes back
    /// as `InvalidState`; nothing else escapes this boundary. Decoding is
    /// idempotent: the same valid token decodes to the same state twice.
    pub fn decode(&self, token: &str) -> Result<OAuthState, SchedulingError> {
        self.decode_at(token, Utc::now().timestamp_millis())
    }

    pub(crate) fn decode_at(
        &self,
        token: &str,
        now_ms: i64,
    ) -> Result<OAuthState, SchedulingError> {
        let (payload_b64, tag_b64) = token
            .split_once('.')
            .ok_or_else(|| SchedulingError::InvalidState("Malformed state token".to_string()))?;

        let payload = base64_engine
            .decode(payload_b64)
            .map_err(|_| SchedulingError::InvalidState("Malformed state payload".to_string()))?;
        let tag = base64_engine
            .decode(tag_b64)
            .map_err(|_| SchedulingError::InvalidState("Malformed state tag".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SchedulingError::InvalidState(format!("HMAC init failed: {e}")))?;
        mac.update(&payload);
        mac.verify_slice(&tag)
            .map_err(|_| SchedulingError::InvalidState("State tag mismatch".to_string()))?;

        let state: OAuthState = serde_json::from_slice(&payload)
            .map_err(|_| SchedulingError::InvalidState("Unreadable state payload".to_string()))?;

        if now_ms - state.issued_at_ms > STATE_TTL_SECS * 1000 {
            return Err(SchedulingError::InvalidState(
                "State token expired".to_string(),
            ));
        }

        Ok(state)
    }

    fn tag(&self, payload: &[u8]) -> Result<Vec<u8>, SchedulingError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SchedulingError::InvalidState(format!("HMAC init failed: {e}")))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
