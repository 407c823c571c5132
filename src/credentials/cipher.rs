//! Field-level encryption using AES-256-GCM.

use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, AeadCore, OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Nonce length for AES-GCM (12 bytes standard)
pub const NONCE_LENGTH: usize = 12;

const KEY_LABEL: &[u8] = b"secrets-keeper/field-encryption/v1";

#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl FieldCipher {
    /// Derive a 256-bit key from the configured secret.
    pub fn from_secret(secret: &str) -> Result<Self, AppError> {
        let mut hasher = Sha256::new();
        hasher.update(KEY_LABEL);
        hasher.update(secret.as_bytes());
        let key = hasher.finalize();
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| AppError::Crypto(format!("Failed to create cipher: {}", e)))?;
        Ok(Self { cipher })
    }

    /// Encrypt and encode as base64(nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut output = nonce.to_vec();
        output.extend(ciphertext);
        Ok(BASE64.encode(output))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, AppError> {
        let raw = BASE64
            .decode(encoded)
            .map_err(|e| AppError::Crypto(format!("Invalid base64 field: {}", e)))?;
        if raw.len() <= NONCE_LENGTH {
            return Err(AppError::Crypto("Encrypted field too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LENGTH);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| AppError::Crypto(format!("Decryption failed: {}", e)))?;
        String::from_utf8(plaintext)
            .map_err(|e| AppError::Crypto(format!("Decrypted field is not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_differ_between_encryptions() {
        let cipher = FieldCipher::from_secret("thisisourlittlesecret").unwrap();
        let a = cipher.encrypt("hunter2").unwrap();
        let b = cipher.encrypt("hunter2").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), "hunter2");
        assert_eq!(cipher.decrypt(&b).unwrap(), "hunter2");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let stored = FieldCipher::from_secret("key-one")
            .unwrap()
            .encrypt("hunter2")
            .unwrap();
        let other = FieldCipher::from_secret("key-two").unwrap();
        assert!(matches!(other.decrypt(&stored), Err(AppError::Crypto(_))));
    }

    #[test]
    fn truncated_field_is_rejected() {
        let cipher = FieldCipher::from_secret("k").unwrap();
        let short = BASE64.encode([0u8; NONCE_LENGTH]);
        assert!(cipher.decrypt(&short).is_err());
    }
}
