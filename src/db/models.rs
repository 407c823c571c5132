use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::credentials::CredentialMaterial;

/// A row of the `users` table.
///
/// Locally registered users carry an `identifier` and credential material;
/// users created through the identity provider carry a `federated_id` and
/// may have neither.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub identifier: Option<String>,
    pub credential: Option<String>,
    pub credential_scheme: Option<String>,
    pub federated_id: Option<String>,
    pub display_name: Option<String>,
    pub secret_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DbUser {
    pub fn credential_material(&self) -> Option<CredentialMaterial> {
        match (&self.credential_scheme, &self.credential) {
            (Some(scheme), Some(value)) => Some(CredentialMaterial {
                scheme: scheme.clone(),
                value: value.clone(),
            }),
            _ => None,
        }
    }
}

/// Extra, optional attributes recorded when a user is created.
#[derive(Debug, Clone, Default)]
pub struct NewUserExtra {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DbSession {
    pub token_hash: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}
