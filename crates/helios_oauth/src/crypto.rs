// --- File: crates/helios_oauth/src/crypto.rs ---
//! Token sealing for stored calendar connections.
//!
//! The store only assumes encrypt/decrypt are inverses; the algorithm is
//! pluggable behind [`TokenCipher`]. The default implementation is
//! AES-256-GCM with a random 96-bit nonce prepended to the ciphertext, all
//! URL-safe base64.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as base64_engine, Engine};
use helios_common::SchedulingError;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

/// An inverse encrypt/decrypt pair over token strings.
pub trait TokenCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, SchedulingError>;
    fn decrypt(&self, sealed: &str) -> Result<String, SchedulingError>;
}

/// AES-256-GCM token cipher keyed from configuration.
pub struct AesGcmTokenCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl AesGcmTokenCipher {
    /// Build a cipher from a base64-encoded 32-byte key.
    pub fn from_base64_key(key_b64: &str) -> Result<Self, SchedulingError> {
        let key_bytes = base64_engine
            .decode(key_b64.trim())
            .map_err(|_| SchedulingError::Config("Token key is not valid base64".to_string()))?;
        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes).map_err(|_| {
            SchedulingError::Config("Token key must be 32 bytes after decoding".to_string())
        })?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }
}

impl TokenCipher for AesGcmTokenCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, SchedulingError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| SchedulingError::Config("Nonce generation failed".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| SchedulingError::Config("Token encryption failed".to_string()))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&in_out);
        Ok(base64_engine.encode(sealed))
    }

    fn decrypt(&self, sealed: &str) -> Result<String, SchedulingError> {
        let bytes = base64_engine
            .decode(sealed)
            .map_err(|_| SchedulingError::Config("Sealed token is not valid base64".to_string()))?;
        if bytes.len() <= NONCE_LEN {
            return Err(SchedulingError::Config("Sealed token too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| SchedulingError::Config("Bad token nonce".to_string()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| SchedulingError::Config("Token decryption failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| SchedulingError::Config("Decrypted token is not UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> AesGcmTokenCipher {
        // 32 zero bytes, base64.
        AesGcmTokenCipher::from_base64_key("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
            .expect("test key")
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let cipher = test_cipher();
        let sealed = cipher.encrypt("ya29.a0AfH6SMBx").unwrap();
        assert_ne!(sealed, "ya29.a0AfH6SMBx");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "ya29.a0AfH6SMBx");
    }

    #[test]
    fn nonces_differ_between_seals() {
        let cipher = test_cipher();
        let a = cipher.encrypt("same-token").unwrap();
        let b = cipher.encrypt("same-token").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let cipher = test_cipher();
        let mut sealed = cipher.encrypt("secret").unwrap();
        sealed.replace_range(..2, "zz");
        assert!(cipher.decrypt(&sealed).is_err());
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(AesGcmTokenCipher::from_base64_key("c2hvcnQ").is_err());
    }
}
