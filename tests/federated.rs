mod common;

use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use common::{TestApp, cookie_header, location, spawn_app, test_config};
use futures::future::join_all;
use secrets_keeper::auth::{Authenticator, ProviderCallback};
use secrets_keeper::config::{Config, CredentialMode};
use secrets_keeper::db::models::NewUserExtra;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

#[derive(Deserialize)]
struct TokenForm {
    code: String,
}

/// Token endpoint: `bad` is rejected, `slow` stalls, anything else is
/// answered with `at-<code>`.
async fn fake_token(Form(form): Form<TokenForm>) -> Response {
    match form.code.as_str() {
        "bad" => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant"})),
        )
            .into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"access_token": "at-slow", "token_type": "Bearer"})).into_response()
        }
        code => Json(json!({
            "access_token": format!("at-{code}"),
            "token_type": "Bearer",
            "expires_in": 3600
        }))
        .into_response(),
    }
}

/// Userinfo endpoint: the subject is the code up to its first `-`.
async fn fake_userinfo(headers: HeaderMap) -> Response {
    let Some(code) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer at-"))
    else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if code.starts_with("nosub") {
        return Json(json!({"name": "No Subject"})).into_response();
    }
    let subject = code.split('-').next().unwrap_or(code);
    Json(json!({"sub": subject, "name": format!("User {subject}")})).into_response()
}

async fn spawn_provider() -> String {
    let app = Router::new()
        .route("/token", post(fake_token))
        .route("/userinfo", get(fake_userinfo));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake provider");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake provider");
    });
    format!("http://{addr}")
}

async fn app_with_provider() -> TestApp {
    let base = spawn_provider().await;
    let cfg = Config {
        provider_auth_url: format!("{base}/authorize"),
        provider_token_url: format!("{base}/token"),
        provider_userinfo_url: format!("{base}/userinfo"),
        provider_timeout_secs: 1,
        ..test_config(CredentialMode::Hash)
    };
    spawn_app(cfg).await
}

/// Start a login and return (csrf state, pending-login cookies).
async fn begin(t: &TestApp) -> (String, String) {
    let resp = t.get("/auth/provider", None).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let target = Url::parse(&location(&resp)).expect("authorize url");
    assert!(target.path().ends_with("/authorize"));
    let params: HashMap<_, _> = target.query_pairs().into_owned().collect();
    assert_eq!(params.get("client_id").map(String::as_str), Some("test-client"));
    assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
    assert!(params.contains_key("code_challenge"));
    let state = params.get("state").cloned().expect("state param");
    (state, cookie_header(&resp))
}

async fn callback(t: &TestApp, code: &str, state: &str, cookies: &str) -> Response {
    t.get(
        &format!("/auth/provider/callback?code={code}&state={state}"),
        Some(cookies),
    )
    .await
}

#[tokio::test]
async fn provider_login_creates_user_and_session() {
    let t = app_with_provider().await;
    let (state, pending) = begin(&t).await;

    let resp = callback(&t, "alice-1", &state, &pending).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/secrets");
    let session = cookie_header(&resp);
    assert!(!session.is_empty());

    assert_eq!(t.get("/secrets", Some(&session)).await.status(), StatusCode::OK);
    assert_eq!(t.storage.count_by_federated_id("alice").await.unwrap(), 1);
}

#[tokio::test]
async fn repeat_provider_login_reuses_local_user() {
    let t = app_with_provider().await;

    let (state, pending) = begin(&t).await;
    let first = callback(&t, "alice-1", &state, &pending).await;
    assert_eq!(location(&first), "/secrets");
    let cookies = cookie_header(&first);
    t.post_form("/submit", "secret=first+login", Some(&cookies))
        .await;

    let (state, pending) = begin(&t).await;
    let second = callback(&t, "alice-2", &state, &pending).await;
    assert_eq!(location(&second), "/secrets");

    assert_eq!(t.storage.count_by_federated_id("alice").await.unwrap(), 1);
    let user = t
        .storage
        .find_or_create_by_federated_id("alice", NewUserExtra::default())
        .await
        .unwrap();
    assert_eq!(user.secret_text.as_deref(), Some("first login"));
    assert_eq!(user.display_name.as_deref(), Some("User alice"));
}

#[tokio::test]
async fn concurrent_find_or_create_yields_one_user() {
    let t = app_with_provider().await;

    let users = join_all((0..16).map(|_| {
        let storage = t.storage.clone();
        async move {
            storage
                .find_or_create_by_federated_id("racer", NewUserExtra::default())
                .await
                .unwrap()
        }
    }))
    .await;

    let first = users[0].id;
    assert!(users.iter().all(|u| u.id == first));
    assert_eq!(t.storage.count_by_federated_id("racer").await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_provider_logins_resolve_to_same_user() {
    let t = app_with_provider().await;

    let results = join_all((0..8).map(|i| {
        let federated = t.state.federated.clone();
        async move {
            federated
                .authenticate(ProviderCallback {
                    code: format!("bob-{i}"),
                    pkce_verifier: "verifier".to_string(),
                })
                .await
                .unwrap()
        }
    }))
    .await;

    let first = results[0].user_id;
    assert!(results.iter().all(|r| r.user_id == first));
    assert_eq!(t.storage.count_by_federated_id("bob").await.unwrap(), 1);
}

#[tokio::test]
async fn csrf_mismatch_redirects_to_login() {
    let t = app_with_provider().await;
    let (_state, pending) = begin(&t).await;

    let resp = callback(&t, "mallory-1", "forged-state", &pending).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
    assert_eq!(t.storage.count_by_federated_id("mallory").await.unwrap(), 0);
}

#[tokio::test]
async fn callback_without_pending_login_redirects_to_login() {
    let t = app_with_provider().await;
    let resp = t
        .get("/auth/provider/callback?code=alice-1&state=whatever", None)
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn provider_denial_redirects_to_login() {
    let t = app_with_provider().await;
    let (state, pending) = begin(&t).await;
    let resp = t
        .get(
            &format!("/auth/provider/callback?error=access_denied&state={state}"),
            Some(&pending),
        )
        .await;
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn rejected_code_redirects_to_login() {
    let t = app_with_provider().await;
    let (state, pending) = begin(&t).await;
    let resp = callback(&t, "bad", &state, &pending).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
    assert!(cookie_header(&resp).is_empty());
}

#[tokio::test]
async fn profile_without_subject_redirects_to_login() {
    let t = app_with_provider().await;
    let (state, pending) = begin(&t).await;
    let resp = callback(&t, "nosub", &state, &pending).await;
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn slow_provider_times_out() {
    let t = app_with_provider().await;
    let (state, pending) = begin(&t).await;

    let started = std::time::Instant::now();
    let resp = callback(&t, "slow", &state, &pending).await;
    assert_eq!(location(&resp), "/login");
    assert!(started.elapsed() < Duration::from_secs(3));
}
