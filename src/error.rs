use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

use crate::views;

#[derive(Debug, ThisError)]
pub enum AppError {
    #[error("identifier already registered")]
    DuplicateIdentifier,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("provider exchange failed: {0}")]
    ProviderExchange(String),

    #[error("OAuth flow error: {0}")]
    OauthFlow(String),

    #[error("provider profile did not contain a subject identifier")]
    MissingProfileSubject,

    #[error("credential protection error: {0}")]
    Crypto(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] SqlxError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::DuplicateIdentifier => StatusCode::CONFLICT,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::OauthFlow(_) => StatusCode::BAD_REQUEST,
            AppError::ProviderExchange(_)
            | AppError::MissingProfileSubject
            | AppError::Reqwest(_)
            | AppError::Json(_) => StatusCode::BAD_GATEWAY,
            AppError::StoreUnavailable(_) | AppError::Crypto(_) | AppError::UrlParse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for AppError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => {
                AppError::ProviderExchange(format!("provider rejected code: {}", err.error()))
            }
            RequestTokenError::Request(req_e) => {
                AppError::ProviderExchange(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => AppError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => AppError::ProviderExchange(s),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match status {
            StatusCode::CONFLICT => "That account already exists.",
            StatusCode::UNAUTHORIZED => "Sign-in failed.",
            StatusCode::BAD_REQUEST => "The request could not be completed.",
            StatusCode::BAD_GATEWAY => "The identity provider is unavailable.",
            _ => "Something went wrong on our side. Please try again later.",
        };
        (status, Html(views::failure_page(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn store_errors_do_not_leak_into_body() {
        let err = AppError::StoreUnavailable(SqlxError::Protocol(
            "connection refused at /var/db/secrets.db".to_string(),
        ));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(!body.contains("/var/db"));
        assert!(body.contains("Something went wrong"));
    }

    #[test]
    fn provider_failures_map_to_bad_gateway() {
        assert_eq!(
            AppError::ProviderExchange("timeout".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(AppError::MissingProfileSubject.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
    }
}
