//! Session lifecycle: opaque tokens mapped to users through the store.

use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::db::{DbUser, UserStorage};
use crate::error::AppError;

/// Who is acting on a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    Anonymous,
    User(DbUser),
}

impl Principal {
    pub fn user(&self) -> Option<&DbUser> {
        match self {
            Principal::User(u) => Some(u),
            Principal::Anonymous => None,
        }
    }
}

#[derive(Clone)]
pub struct SessionManager {
    storage: UserStorage,
}

impl SessionManager {
    pub fn new(storage: UserStorage) -> Self {
        Self { storage }
    }

    /// Issue a fresh token for `user_id`. Only its hash is persisted.
    pub async fn establish(&self, user_id: i64) -> Result<String, AppError> {
        let token = generate_session_token();
        self.storage
            .insert_session(&hash_session_token(&token), user_id)
            .await?;
        info!(user_id, "session established");
        Ok(token)
    }

    /// Map a token to the current user row.
    ///
    /// Unknown tokens and sessions whose user has vanished are `Anonymous`;
    /// only store failures are errors.
    pub async fn resolve(&self, token: &str) -> Result<Principal, AppError> {
        let token_hash = hash_session_token(token);
        let Some(session) = self.storage.lookup_session(&token_hash).await? else {
            debug!("session token not recognised");
            return Ok(Principal::Anonymous);
        };
        match self.storage.find_by_id(session.user_id).await? {
            Some(user) => Ok(Principal::User(user)),
            None => {
                warn!(user_id = session.user_id, "session refers to missing user");
                Ok(Principal::Anonymous)
            }
        }
    }

    pub async fn destroy(&self, token: &str) -> Result<(), AppError> {
        self.storage
            .delete_session(&hash_session_token(token))
            .await?;
        debug!("session destroyed");
        Ok(())
    }
}

/// 32 random bytes, base64url without padding.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
