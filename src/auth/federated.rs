use std::time::Duration;

use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
    StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenResponse,
    },
};
use serde::Deserialize;
use serde_json::Value;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use url::Url;

use super::{AuthResult, Authenticator};
use crate::config::Config;
use crate::db::UserStorage;
use crate::db::models::NewUserExtra;
use crate::error::AppError;

/// Where a federated login attempt stands.
///
/// `Unauthenticated -> AwaitingProviderRedirect -> AwaitingProviderCallback
/// -> Authenticated | Failed`. Both end states are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederatedLoginState {
    Unauthenticated,
    AwaitingProviderRedirect {
        csrf_state: String,
        pkce_verifier: String,
    },
    AwaitingProviderCallback {
        csrf_state: String,
        pkce_verifier: String,
    },
    Authenticated {
        user_id: i64,
    },
    Failed {
        reason: String,
    },
}

impl FederatedLoginState {
    /// Record the pending redirect produced by `begin_federated_login`.
    pub fn begin(self, redirect: &ProviderRedirect) -> Result<Self, AppError> {
        match self {
            Self::Unauthenticated => Ok(Self::AwaitingProviderRedirect {
                csrf_state: redirect.csrf_state.clone(),
                pkce_verifier: redirect.pkce_verifier.clone(),
            }),
            other => Err(illegal("begin", &other)),
        }
    }

    /// The browser has been sent to the provider.
    pub fn redirected(self) -> Result<Self, AppError> {
        match self {
            Self::AwaitingProviderRedirect {
                csrf_state,
                pkce_verifier,
            } => Ok(Self::AwaitingProviderCallback {
                csrf_state,
                pkce_verifier,
            }),
            other => Err(illegal("redirected", &other)),
        }
    }

    /// Validate the provider's callback parameters against the pending attempt.
    pub fn accept_callback(
        &self,
        code: Option<&str>,
        state: Option<&str>,
        provider_error: Option<&str>,
    ) -> Result<ProviderCallback, AppError> {
        let Self::AwaitingProviderCallback {
            csrf_state,
            pkce_verifier,
        } = self
        else {
            return Err(illegal("callback", self));
        };
        if let Some(err) = provider_error {
            return Err(AppError::ProviderExchange(format!(
                "provider returned error `{err}`"
            )));
        }
        let state = state.ok_or_else(|| AppError::OauthFlow("missing `state` in callback".into()))?;
        if !bool::from(state.as_bytes().ct_eq(csrf_state.as_bytes())) {
            return Err(AppError::OauthFlow("CSRF token mismatch".into()));
        }
        let code = code.ok_or_else(|| AppError::OauthFlow("missing `code` in callback".into()))?;
        Ok(ProviderCallback {
            code: code.to_owned(),
            pkce_verifier: pkce_verifier.clone(),
        })
    }

    /// Settle the attempt from the exchange outcome.
    pub fn finish(self, outcome: &Result<AuthResult, AppError>) -> Self {
        match (self, outcome) {
            (Self::AwaitingProviderCallback { .. }, Ok(res)) => Self::Authenticated {
                user_id: res.user_id,
            },
            (Self::AwaitingProviderCallback { .. }, Err(e)) => Self::Failed {
                reason: e.to_string(),
            },
            (other, _) => Self::Failed {
                reason: illegal("finish", &other).to_string(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authenticated { .. } | Self::Failed { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "Unauthenticated",
            Self::AwaitingProviderRedirect { .. } => "AwaitingProviderRedirect",
            Self::AwaitingProviderCallback { .. } => "AwaitingProviderCallback",
            Self::Authenticated { .. } => "Authenticated",
            Self::Failed { .. } => "Failed",
        }
    }
}

fn illegal(transition: &str, from: &FederatedLoginState) -> AppError {
    AppError::OauthFlow(format!("cannot {transition} from {}", from.name()))
}

/// Everything the browser needs to go to the provider, plus the values to
/// keep until it comes back.
#[derive(Debug, Clone)]
pub struct ProviderRedirect {
    pub authorize_url: Url,
    pub csrf_state: String,
    pub pkce_verifier: String,
}

/// A validated callback ready to be exchanged.
#[derive(Debug, Clone)]
pub struct ProviderCallback {
    pub code: String,
    pub pkce_verifier: String,
}

/// Subset of the provider's userinfo document.
#[derive(Debug, Deserialize)]
struct ProviderProfile {
    sub: Option<String>,
    // some providers expose a numeric `id` instead of `sub`
    id: Option<Value>,
    name: Option<String>,
    email: Option<String>,
}

impl ProviderProfile {
    fn subject(&self) -> Option<String> {
        if let Some(sub) = self.sub.as_ref().filter(|s| !s.is_empty()) {
            return Some(sub.clone());
        }
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

type ProviderOauth2Client = OAuth2Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Authorization-code login against an external OAuth2 provider.
#[derive(Clone)]
pub struct FederatedAuthenticator {
    client: ProviderOauth2Client,
    http: reqwest::Client,
    userinfo_url: Url,
    scopes: Vec<String>,
    timeout: Duration,
    storage: UserStorage,
}

impl FederatedAuthenticator {
    pub fn new(cfg: &Config, storage: UserStorage) -> Result<Self, AppError> {
        let client = OAuth2Client::new(ClientId::new(cfg.client_id.clone()))
            .set_client_secret(ClientSecret::new(cfg.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(cfg.provider_auth_url.clone())?)
            .set_token_uri(TokenUrl::new(cfg.provider_token_url.clone())?)
            .set_redirect_uri(RedirectUrl::new(cfg.callback_url.clone())?);

        let timeout = cfg.provider_timeout();
        // provider responses are never followed as redirects
        let http = reqwest::Client::builder()
            .user_agent("secrets-keeper/0.1")
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            http,
            userinfo_url: Url::parse(&cfg.provider_userinfo_url)?,
            scopes: cfg.provider_scopes.clone(),
            timeout,
            storage,
        })
    }

    pub fn default_scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Build the provider consent URL with a fresh CSRF state and PKCE pair.
    pub fn begin_federated_login(&self, requested_scopes: &[String]) -> ProviderRedirect {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (authorize_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(requested_scopes.iter().cloned().map(Scope::new))
            .set_pkce_challenge(challenge)
            .url();
        ProviderRedirect {
            authorize_url,
            csrf_state: csrf_token.secret().to_string(),
            pkce_verifier: verifier.secret().to_string(),
        }
    }

    /// Exchange the code, fetch the profile and find-or-create the local user.
    ///
    /// Bounded by the configured provider timeout; no retries.
    pub async fn complete_federated_login(
        &self,
        callback: ProviderCallback,
    ) -> Result<AuthResult, AppError> {
        let profile = tokio::time::timeout(self.timeout, self.exchange(callback))
            .await
            .map_err(|_| {
                AppError::ProviderExchange(format!(
                    "provider exchange timed out after {:?}",
                    self.timeout
                ))
            })??;

        let subject = profile.subject().ok_or(AppError::MissingProfileSubject)?;
        let extra = NewUserExtra {
            display_name: profile.name.or(profile.email),
        };
        let user = self
            .storage
            .find_or_create_by_federated_id(&subject, extra)
            .await?;
        info!(user_id = user.id, "federated login succeeded");
        Ok(AuthResult {
            user_id: user.id,
            user,
        })
    }

    async fn exchange(&self, callback: ProviderCallback) -> Result<ProviderProfile, AppError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(callback.code))
            .set_pkce_verifier(PkceCodeVerifier::new(callback.pkce_verifier))
            .request_async(&self.http)
            .await
            .inspect_err(|e| warn!(error = %e, "authorization code exchange failed"))?;

        let profile = self
            .http
            .get(self.userinfo_url.clone())
            .bearer_auth(token.access_token().secret())
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<ProviderProfile>()
            .await?;
        Ok(profile)
    }
}

impl Authenticator for FederatedAuthenticator {
    type Credentials = ProviderCallback;

    async fn authenticate(&self, credentials: ProviderCallback) -> Result<AuthResult, AppError> {
        self.complete_federated_login(credentials).await
    }
}
