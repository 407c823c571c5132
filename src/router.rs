use axum::{Router, extract::FromRef, routing::get};
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use tower_http::trace::TraceLayer;

use crate::auth::{FederatedAuthenticator, LocalAuthenticator};
use crate::config::Config;
use crate::credentials::CredentialProtector;
use crate::db::UserStorage;
use crate::error::AppError;
use crate::handlers::{account, federated, secrets};
use crate::session::SessionManager;

const COOKIE_KEY_LABEL: &[u8] = b"secrets-keeper/cookie-key/v1";

/// Shared handler state. Everything inside is cheap to clone; mutable state
/// lives in the database.
#[derive(Clone)]
pub struct AppState {
    pub storage: UserStorage,
    pub sessions: SessionManager,
    pub local: LocalAuthenticator,
    pub federated: FederatedAuthenticator,
    pub insecure_cookie: bool,
    cookie_key: Key,
}

impl AppState {
    pub fn new(cfg: &Config, storage: UserStorage) -> Result<Self, AppError> {
        let protector = CredentialProtector::new(cfg.credential_mode, &cfg.secret)?;
        Ok(Self {
            sessions: SessionManager::new(storage.clone()),
            local: LocalAuthenticator::new(storage.clone(), protector)?,
            federated: FederatedAuthenticator::new(cfg, storage.clone())?,
            insecure_cookie: cfg.insecure_cookie,
            cookie_key: derive_cookie_key(&cfg.secret),
            storage,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// 64-byte private-cookie key derived from the configured secret.
fn derive_cookie_key(secret: &str) -> Key {
    let mut hasher = Sha512::new();
    hasher.update(COOKIE_KEY_LABEL);
    hasher.update(secret.as_bytes());
    Key::from(hasher.finalize().as_slice())
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(account::home))
        .route("/login", get(account::login_form).post(account::login_submit))
        .route(
            "/register",
            get(account::register_form).post(account::register_submit),
        )
        .route("/logout", get(account::logout))
        .route("/secrets", get(secrets::list_secrets))
        .route("/submit", get(secrets::submit_form).post(secrets::submit_secret))
        .route("/auth/provider", get(federated::provider_entry))
        .route("/auth/provider/callback", get(federated::provider_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
