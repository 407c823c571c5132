use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use tracing::error;

use crate::db::DbUser;
use crate::router::AppState;
use crate::session::Principal;

pub const SESSION_COOKIE: &str = "session";

/// Per-request context: the resolved principal and the token it came from.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub principal: Principal,
    pub token: Option<String>,
}

impl Viewer {
    pub fn user(&self) -> Option<&DbUser> {
        self.principal.user()
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let key = Key::from_ref(&app);
        let jar = PrivateCookieJar::from_headers(&parts.headers, key);

        // undecryptable or absent cookies resolve to nobody
        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
            return Ok(Viewer {
                principal: Principal::Anonymous,
                token: None,
            });
        };

        match app.sessions.resolve(&token).await {
            Ok(principal) => Ok(Viewer {
                principal,
                token: Some(token),
            }),
            Err(e) => {
                error!(error = %e, uri = %parts.uri, "session resolution failed");
                Err(e.into_response())
            }
        }
    }
}

/// A signed-in user; anonymous requests are redirected to `/login`.
#[derive(Debug, Clone)]
pub struct RequireUser(pub DbUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let viewer = Viewer::from_request_parts(parts, state).await?;
        match viewer.principal {
            Principal::User(user) => Ok(RequireUser(user)),
            Principal::Anonymous => Err(Redirect::to("/login").into_response()),
        }
    }
}

pub fn session_cookie(token: String, insecure: bool) -> Cookie<'static> {
    Cookie::build(Cookie::new(SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(!insecure)
        .same_site(SameSite::Lax)
        .build()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build(Cookie::new(SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
