//! Local and federated authentication behind one [`Authenticator`] capability.
//!
//! Routes pick the implementation explicitly; nothing is registered at runtime.

pub mod federated;
pub mod local;

use std::future::Future;

use crate::db::DbUser;
use crate::error::AppError;

pub use federated::{FederatedAuthenticator, FederatedLoginState, ProviderCallback, ProviderRedirect};
pub use local::{LocalAuthenticator, LocalCredentials};

/// Successful outcome of an authentication attempt.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub user_id: i64,
    pub user: DbUser,
}

pub trait Authenticator {
    type Credentials: Send;

    /// Verify `credentials` and return the local user they belong to.
    fn authenticate(
        &self,
        credentials: Self::Credentials,
    ) -> impl Future<Output = Result<AuthResult, AppError>> + Send;
}
