#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use secrets_keeper::config::{Config, CredentialMode};
use secrets_keeper::db::{UserStorage, connect};
use secrets_keeper::{AppState, app_router};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub storage: UserStorage,
    db_path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

pub fn test_config(mode: CredentialMode) -> Config {
    Config {
        secret: "thisisourlittlesecret".to_string(),
        credential_mode: mode,
        client_id: "test-client".to_string(),
        client_secret: "test-client-secret".to_string(),
        insecure_cookie: true,
        ..Config::default()
    }
}

pub async fn spawn_app(cfg: Config) -> TestApp {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut db_path = std::env::temp_dir();
    db_path.push(format!(
        "secrets-keeper-test-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));

    let database_url = format!("sqlite:{}", db_path.display());
    let pool = connect(&database_url).await.expect("failed to open database");
    let storage = UserStorage::new(pool);
    storage.init_schema().await.expect("failed to init schema");

    let state = AppState::new(&cfg, storage.clone()).expect("failed to build state");
    let app = app_router(state.clone());
    TestApp {
        app,
        state,
        storage,
        db_path,
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.expect("request failed")
    }

    pub async fn get(&self, uri: &str, cookies: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(c) = cookies {
            builder = builder.header(header::COOKIE, c);
        }
        self.send(builder.body(Body::empty()).expect("failed to build request"))
            .await
    }

    pub async fn post_form(&self, uri: &str, form: &str, cookies: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(c) = cookies {
            builder = builder.header(header::COOKIE, c);
        }
        self.send(
            builder
                .body(Body::from(form.to_string()))
                .expect("failed to build request"),
        )
        .await
    }

    /// Register and return the session cookie header value.
    pub async fn register(&self, username: &str, password: &str) -> String {
        let resp = self
            .post_form(
                "/register",
                &format!("username={username}&password={password}"),
                None,
            )
            .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/secrets");
        cookie_header(&resp)
    }
}

pub fn location<B>(resp: &Response<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Turn the response's non-empty `Set-Cookie` values into a `Cookie` header.
pub fn cookie_header<B>(resp: &Response<B>) -> String {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter(|pair| pair.split_once('=').is_some_and(|(_, value)| !value.is_empty()))
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn body_string(resp: Response<Body>) -> String {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    String::from_utf8(body.to_vec()).expect("response body was not utf-8")
}
