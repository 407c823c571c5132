//! Salted one-way hashing with Argon2id.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core},
};

use crate::error::AppError;

/// Hash a secret into a PHC string that embeds its random salt.
pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Crypto(format!("Password hashing failed: {}", e)))
}

/// Re-hash `presented` with the stored salt and compare in constant time.
pub fn verify_secret(presented: &str, phc: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| AppError::Crypto(format!("Stored hash is malformed: {}", e)))?;
    match Argon2::default().verify_password(presented.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Crypto(format!("Password verification failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_secret_gets_distinct_salts() {
        let a = hash_secret("hunter2").unwrap();
        let b = hash_secret("hunter2").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
        assert!(verify_secret("hunter2", &a).unwrap());
        assert!(verify_secret("hunter2", &b).unwrap());
    }

    #[test]
    fn wrong_secret_does_not_verify() {
        let phc = hash_secret("hunter2").unwrap();
        assert!(!verify_secret("hunter3", &phc).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_secret("hunter2", "not-a-phc-string").is_err());
    }
}
