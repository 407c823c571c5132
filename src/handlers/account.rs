use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::auth::{Authenticator, LocalCredentials};
use crate::error::AppError;
use crate::middleware::Viewer;
use crate::middleware::session::{clear_session_cookie, session_cookie};
use crate::router::AppState;
use crate::views;

/// Absent fields arrive empty so the handlers can re-render the form.
#[derive(Debug, Deserialize)]
pub struct AccountForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn home() -> Html<String> {
    Html(views::home_page())
}

pub async fn login_form() -> Html<String> {
    Html(views::login_page(None))
}

pub async fn register_form() -> Html<String> {
    Html(views::register_page(None))
}

/// POST /register -> create the user, then sign them in.
pub async fn register_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<AccountForm>,
) -> Response {
    let identifier = form.username.trim();
    if identifier.is_empty() || form.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Html(views::register_page(Some("Email and password are required."))),
        )
            .into_response();
    }

    let user = match state.local.register(identifier, &form.password).await {
        Ok(user) => user,
        Err(AppError::DuplicateIdentifier) => {
            warn!(route = "POST /register", identifier, "identifier already registered");
            return (
                StatusCode::CONFLICT,
                Html(views::register_page(Some(
                    "An account with that email already exists.",
                ))),
            )
                .into_response();
        }
        Err(e) => {
            error!(route = "POST /register", error = %e, "registration failed");
            return e.into_response();
        }
    };

    match state.sessions.establish(user.id).await {
        Ok(token) => {
            info!(route = "POST /register", user_id = user.id, "registered and signed in");
            let jar = jar.add(session_cookie(token, state.insecure_cookie));
            (jar, Redirect::to("/secrets")).into_response()
        }
        Err(e) => {
            error!(route = "POST /register", error = %e, "failed to establish session");
            e.into_response()
        }
    }
}

/// POST /login -> verify the pair; re-render the form on any mismatch.
pub async fn login_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<AccountForm>,
) -> Response {
    let credentials = LocalCredentials {
        identifier: form.username.trim().to_string(),
        secret: form.password,
    };

    let auth = match state.local.authenticate(credentials).await {
        Ok(auth) => auth,
        Err(AppError::InvalidCredentials) => {
            warn!(route = "POST /login", "invalid credentials");
            return (
                StatusCode::UNAUTHORIZED,
                Html(views::login_page(Some("Invalid email or password."))),
            )
                .into_response();
        }
        Err(e) => {
            error!(route = "POST /login", error = %e, "login failed");
            return e.into_response();
        }
    };

    match state.sessions.establish(auth.user_id).await {
        Ok(token) => {
            let jar = jar.add(session_cookie(token, state.insecure_cookie));
            (jar, Redirect::to("/secrets")).into_response()
        }
        Err(e) => {
            error!(route = "POST /login", error = %e, "failed to establish session");
            e.into_response()
        }
    }
}

/// GET /logout -> drop the session row and the cookie.
pub async fn logout(
    State(state): State<AppState>,
    viewer: Viewer,
    jar: PrivateCookieJar,
) -> Response {
    if let Some(token) = viewer.token.as_deref()
        && let Err(e) = state.sessions.destroy(token).await
    {
        error!(route = "GET /logout", error = %e, "failed to destroy session");
        return e.into_response();
    }
    if let Some(user) = viewer.user() {
        info!(user_id = user.id, "signed out");
    }
    let jar = jar.remove(clear_session_cookie());
    (jar, Redirect::to("/")).into_response()
}
