use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URI: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Process-wide configuration, read from the environment on first access.
pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::load().expect("FATAL: invalid configuration"));

/// Env keys picked up by [`Config::load`]; matched case-insensitively.
const ENV_KEYS: &[&str] = &[
    "database_url",
    "listen_addr",
    "loglevel",
    "secret",
    "credential_mode",
    "client_id",
    "client_secret",
    "callback_url",
    "provider_auth_url",
    "provider_token_url",
    "provider_userinfo_url",
    "provider_scopes",
    "provider_timeout_secs",
    "insecure_cookie",
];

/// How local credentials are protected at rest. One mode per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    /// Reversible AES-256-GCM field encryption keyed from `SECRET`.
    Encrypt,
    /// Salted Argon2id hash; the raw secret is never stored.
    #[default]
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    pub loglevel: String,
    pub secret: String,
    pub credential_mode: CredentialMode,
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    pub provider_auth_url: String,
    pub provider_token_url: String,
    pub provider_userinfo_url: String,
    /// `PROVIDER_SCOPES=openid,profile,email` or `[openid, profile, email]`.
    #[serde(deserialize_with = "scope_list")]
    pub provider_scopes: Vec<String>,
    pub provider_timeout_secs: u64,
    pub insecure_cookie: bool,
}

fn scope_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scopes {
        List(Vec<String>),
        Joined(String),
    }

    let raw = match Scopes::deserialize(deserializer)? {
        Scopes::List(list) => list,
        Scopes::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };
    Ok(raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:secrets.db".to_string(),
            listen_addr: "0.0.0.0:3000".to_string(),
            loglevel: "info".to_string(),
            secret: String::new(),
            credential_mode: CredentialMode::default(),
            client_id: String::new(),
            client_secret: String::new(),
            callback_url: "http://localhost:3000/auth/provider/callback".to_string(),
            provider_auth_url: GOOGLE_AUTH_URL.to_string(),
            provider_token_url: GOOGLE_TOKEN_URI.to_string(),
            provider_userinfo_url: GOOGLE_USERINFO_URI.to_string(),
            provider_scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
            provider_timeout_secs: 10,
            insecure_cookie: false,
        }
    }
}

impl Config {
    /// Merge defaults with recognized environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        let cfg: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::raw().only(ENV_KEYS))
            .extract()?;
        if cfg.secret.trim().is_empty() {
            return Err(figment::Error::from(
                "SECRET must be set to non-empty key material".to_string(),
            ));
        }
        Ok(cfg)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.max(1))
    }
}
