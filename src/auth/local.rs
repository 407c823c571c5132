use tracing::{debug, info, warn};

use super::{AuthResult, Authenticator};
use crate::credentials::{CredentialMaterial, CredentialProtector};
use crate::db::models::NewUserExtra;
use crate::db::{DbUser, UserStorage};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct LocalCredentials {
    pub identifier: String,
    pub secret: String,
}

/// Identifier/secret authentication against the credential store.
#[derive(Clone)]
pub struct LocalAuthenticator {
    storage: UserStorage,
    protector: CredentialProtector,
    // verified against when the identifier is unknown, to keep timing uniform
    decoy: CredentialMaterial,
}

impl LocalAuthenticator {
    pub fn new(storage: UserStorage, protector: CredentialProtector) -> Result<Self, AppError> {
        let decoy = protector.protect("decoy-credential")?;
        Ok(Self {
            storage,
            protector,
            decoy,
        })
    }

    pub fn protector(&self) -> &CredentialProtector {
        &self.protector
    }

    /// Protect the secret with the deployment's mode and create the user.
    pub async fn register(&self, identifier: &str, secret: &str) -> Result<DbUser, AppError> {
        let material = self.protector.protect(secret)?;
        self.storage
            .create(identifier, material, NewUserExtra::default())
            .await
    }
}

impl Authenticator for LocalAuthenticator {
    type Credentials = LocalCredentials;

    async fn authenticate(&self, credentials: LocalCredentials) -> Result<AuthResult, AppError> {
        let LocalCredentials { identifier, secret } = credentials;

        let Some(user) = self.storage.find_by_identifier(&identifier).await? else {
            let _ = self.protector.verify(&secret, &self.decoy);
            debug!(%identifier, "login for unknown identifier");
            return Err(AppError::InvalidCredentials);
        };

        let Some(material) = user.credential_material() else {
            warn!(user_id = user.id, "user has no local credential");
            return Err(AppError::InvalidCredentials);
        };

        if !self.protector.verify(&secret, &material)? {
            debug!(user_id = user.id, "login secret mismatch");
            return Err(AppError::InvalidCredentials);
        }

        info!(user_id = user.id, %identifier, "local login succeeded");
        Ok(AuthResult {
            user_id: user.id,
            user,
        })
    }
}
