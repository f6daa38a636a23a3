//! At-rest encryption for stored provider credentials
//!
//! When enabled, the sensitive columns (`sites.sendgrid_api_key`,
//! `channel_sessions.session_api_key`) hold AES-256-GCM ciphertext instead
//! of plaintext. Values are tagged with a version prefix so a disabled
//! cipher can tell encrypted columns apart from legacy plaintext and an
//! enabled one can pass legacy plaintext through during migration.

use crate::error::{DatabaseError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};

const PREFIX: &str = "enc:v1:";
const NONCE_LEN: usize = 12;

/// Column-level cipher for credential values
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Option<Aes256Gcm>,
}

impl SecretCipher {
    /// Pass-through cipher; stored values are used as-is
    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    /// Cipher keyed by the configured secret. The key material is the
    /// SHA-256 digest of the configured string, so any passphrase length
    /// works.
    pub fn from_key(key: &str) -> Result<Self> {
        if key.trim().is_empty() {
            return Err(DatabaseError::Encryption(
                "encryption key must not be empty".to_string(),
            ));
        }
        let digest = Sha256::digest(key.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&digest)
            .map_err(|e| DatabaseError::Encryption(e.to_string()))?;
        Ok(Self {
            cipher: Some(cipher),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Encrypt a value for storage. Pass-through when disabled.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let Some(cipher) = &self.cipher else {
            return Ok(plaintext.to_string());
        };

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| DatabaseError::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(format!("{PREFIX}{}", BASE64.encode(blob)))
    }

    /// Decrypt a stored value. Untagged values pass through unchanged;
    /// tagged values require an enabled cipher.
    pub fn decrypt(&self, stored: &str) -> Result<String> {
        let Some(encoded) = stored.strip_prefix(PREFIX) else {
            return Ok(stored.to_string());
        };

        let Some(cipher) = &self.cipher else {
            return Err(DatabaseError::Encryption(
                "encrypted column read with encryption disabled".to_string(),
            ));
        };

        let blob = BASE64
            .decode(encoded)
            .map_err(|e| DatabaseError::Encryption(e.to_string()))?;
        if blob.len() <= NONCE_LEN {
            return Err(DatabaseError::Encryption(
                "encrypted value too short".to_string(),
            ));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| DatabaseError::Encryption("decryption failed".to_string()))?;

        String::from_utf8(plaintext).map_err(|e| DatabaseError::Encryption(e.to_string()))
    }

    /// Decrypt an optional column value
    pub fn decrypt_opt(&self, stored: Option<String>) -> Result<Option<String>> {
        stored.map(|value| self.decrypt(&value)).transpose()
    }
}
