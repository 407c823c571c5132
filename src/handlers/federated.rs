use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use tracing::{error, info, warn};

use crate::auth::{Authenticator, FederatedLoginState, ProviderRedirect};
use crate::error::AppError;
use crate::middleware::session::session_cookie;
use crate::router::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

const CSRF_COOKIE: &str = "oauth_csrf_token";
const PKCE_COOKIE: &str = "oauth_pkce_verifier";

/// GET /auth/provider -> redirects to the provider's consent page.
pub async fn provider_entry(State(state): State<AppState>, jar: PrivateCookieJar) -> Response {
    let scopes = state.federated.default_scopes().to_vec();
    let redirect = state.federated.begin_federated_login(&scopes);

    let login = FederatedLoginState::Unauthenticated
        .begin(&redirect)
        .and_then(FederatedLoginState::redirected);
    if let Err(e) = login {
        error!(error = %e, "federated login could not start");
        return e.into_response();
    }

    let jar = store_oauth_cookies(jar, &redirect, state.insecure_cookie);
    info!("Dispatching OAuth redirect");
    (jar, Redirect::temporary(redirect.authorize_url.as_str())).into_response()
}

/// GET /auth/provider/callback -> exchanges the code and signs the user in.
///
/// Any provider or flow failure ends the attempt with a redirect to `/login`.
pub async fn provider_callback(
    State(state): State<AppState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> Response {
    let (login, jar) = load_oauth_session(jar);

    let outcome = match login.accept_callback(
        query.code.as_deref(),
        query.state.as_deref(),
        query.error.as_deref(),
    ) {
        Ok(callback) => state.federated.authenticate(callback).await,
        Err(e) => Err(e),
    };

    if let Err(AppError::StoreUnavailable(e)) = &outcome {
        error!(route = "GET /auth/provider/callback", error = %e, "store failed during federated login");
    }
    let settled = login.finish(&outcome);

    match (settled, outcome) {
        (FederatedLoginState::Authenticated { user_id }, _) => {
            match state.sessions.establish(user_id).await {
                Ok(token) => {
                    let jar = jar.add(session_cookie(token, state.insecure_cookie));
                    (jar, Redirect::to("/secrets")).into_response()
                }
                Err(e) => {
                    error!(user_id, error = %e, "failed to establish session");
                    (jar, e).into_response()
                }
            }
        }
        (_, Err(e @ AppError::StoreUnavailable(_))) => (jar, e).into_response(),
        (FederatedLoginState::Failed { reason }, _) => {
            warn!(%reason, "federated login failed");
            (jar, Redirect::to("/login")).into_response()
        }
        (other, _) => {
            warn!(state = ?other, "federated login ended in a non-terminal state");
            (jar, Redirect::to("/login")).into_response()
        }
    }
}

fn store_oauth_cookies(
    jar: PrivateCookieJar,
    redirect: &ProviderRedirect,
    insecure: bool,
) -> PrivateCookieJar {
    jar.add(build_cookie(CSRF_COOKIE, redirect.csrf_state.clone(), insecure))
        .add(build_cookie(PKCE_COOKIE, redirect.pkce_verifier.clone(), insecure))
}

/// Rebuild the pending attempt from its cookies and clear them.
///
/// Missing cookies give `Unauthenticated`, which rejects any callback.
fn load_oauth_session(jar: PrivateCookieJar) -> (FederatedLoginState, PrivateCookieJar) {
    let csrf = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned());
    let pkce = jar.get(PKCE_COOKIE).map(|c| c.value().to_owned());
    let jar = clear_oauth_cookies(jar);

    let login = match (csrf, pkce) {
        (Some(csrf_state), Some(pkce_verifier)) => FederatedLoginState::AwaitingProviderCallback {
            csrf_state,
            pkce_verifier,
        },
        _ => {
            warn!("OAuth callback without pending login cookies");
            FederatedLoginState::Unauthenticated
        }
    };
    (login, jar)
}

fn clear_oauth_cookies(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE))
        .remove(clear_cookie(PKCE_COOKIE))
}

fn build_cookie(name: &str, value: String, insecure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(!insecure)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
