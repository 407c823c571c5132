use axum::{
    Form,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::router::AppState;
use crate::views;

#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    pub secret: String,
}

/// GET /secrets -> every stored secret, for signed-in users only.
pub async fn list_secrets(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Html<String>, AppError> {
    let secrets = state.storage.list_secrets().await.inspect_err(|e| {
        error!(route = "GET /secrets", user_id = user.id, error = %e, "failed to list secrets");
    })?;
    Ok(Html(views::secrets_page(&secrets)))
}

pub async fn submit_form(RequireUser(_user): RequireUser) -> Html<String> {
    Html(views::submit_page())
}

/// POST /submit -> store the text on the signed-in user's record.
pub async fn submit_secret(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Form(form): Form<SubmitForm>,
) -> Response {
    match state.storage.update_secret_text(user.id, &form.secret).await {
        Ok(true) => {
            info!(route = "POST /submit", user_id = user.id, "secret stored");
            Redirect::to("/secrets").into_response()
        }
        Ok(false) => {
            warn!(route = "POST /submit", user_id = user.id, "user vanished before update");
            Redirect::to("/login").into_response()
        }
        Err(e) => {
            error!(route = "POST /submit", user_id = user.id, error = %e, "failed to store secret");
            e.into_response()
        }
    }
}
