//! Credential protection for locally registered users.
//!
//! A deployment runs exactly one [`CredentialMode`]. Stored material is
//! tagged with the scheme that produced it so a row written under the other
//! mode never verifies.

pub mod cipher;
pub mod hash;

use subtle::ConstantTimeEq;
use tracing::warn;

pub use crate::config::CredentialMode;
use crate::error::AppError;
use cipher::FieldCipher;

pub const SCHEME_ENCRYPTED: &str = "aes256gcm";
pub const SCHEME_ARGON2: &str = "argon2id";

/// Protected form of a secret, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialMaterial {
    pub scheme: String,
    pub value: String,
}

#[derive(Clone)]
enum Protection {
    Encrypt(FieldCipher),
    Hash,
}

#[derive(Clone)]
pub struct CredentialProtector {
    protection: Protection,
}

impl CredentialProtector {
    pub fn new(mode: CredentialMode, secret: &str) -> Result<Self, AppError> {
        let protection = match mode {
            CredentialMode::Encrypt => Protection::Encrypt(FieldCipher::from_secret(secret)?),
            CredentialMode::Hash => Protection::Hash,
        };
        Ok(Self { protection })
    }

    fn scheme(&self) -> &'static str {
        match self.protection {
            Protection::Encrypt(_) => SCHEME_ENCRYPTED,
            Protection::Hash => SCHEME_ARGON2,
        }
    }

    pub fn protect(&self, secret: &str) -> Result<CredentialMaterial, AppError> {
        let value = match &self.protection {
            Protection::Encrypt(cipher) => cipher.encrypt(secret)?,
            Protection::Hash => hash::hash_secret(secret)?,
        };
        Ok(CredentialMaterial {
            scheme: self.scheme().to_string(),
            value,
        })
    }

    /// Check a presented secret against stored material.
    ///
    /// Material from the other scheme, or that fails to decrypt, is a mismatch.
    pub fn verify(&self, presented: &str, stored: &CredentialMaterial) -> Result<bool, AppError> {
        if stored.scheme != self.scheme() {
            warn!(
                stored = %stored.scheme,
                active = %self.scheme(),
                "credential scheme mismatch; refusing to verify"
            );
            return Ok(false);
        }
        match &self.protection {
            Protection::Encrypt(cipher) => match cipher.decrypt(&stored.value) {
                Ok(plain) => Ok(bool::from(plain.as_bytes().ct_eq(presented.as_bytes()))),
                Err(e) => {
                    warn!(error = %e, "stored credential failed to decrypt");
                    Ok(false)
                }
            },
            Protection::Hash => hash::verify_secret(presented, &stored.value),
        }
    }

    /// Recover the plaintext of encrypted material. Hash mode has none.
    pub fn reveal(&self, stored: &CredentialMaterial) -> Result<Option<String>, AppError> {
        match &self.protection {
            Protection::Encrypt(cipher) if stored.scheme == SCHEME_ENCRYPTED => {
                cipher.decrypt(&stored.value).map(Some)
            }
            _ => Ok(None),
        }
    }
}
