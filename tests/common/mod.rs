//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which starts a mock control plane, builds a
//! [`Config`] pointing at it and drives the full router with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::json;
use streamgate::config::Config;
use streamgate::server::{create_router, AppContext};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
pub const ACCESS_TOKEN: &str = "test-access-token";

/// Gateway router plus the mock control plane behind it.
pub struct TestHarness {
    pub control_plane: MockServer,
    pub app: Router,
}

/// Collected response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestHarness {
    /// Build a gateway with default configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Build a gateway after letting `customize` adjust the configuration.
    pub async fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let control_plane = MockServer::start().await;
        mount_login(&control_plane).await;

        let mut config = Config::default();
        config.restreamer.url = control_plane.uri();
        config.restreamer.username = USERNAME.to_string();
        config.restreamer.password = PASSWORD.to_string();
        customize(&mut config);

        let app = create_router(AppContext::new(config));
        Self { control_plane, app }
    }

    /// Send one request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body collects")
            .to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

/// Answer every login with a non-JWT token (fallback lifetime applies).
async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "refresh_token": "test-refresh-token",
        })))
        .mount(server)
        .await;
}

/// Canonical process object as the control plane returns it.
pub fn process_json(process_id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": process_id,
        "type": "ffmpeg",
        "reference": process_id.trim_start_matches("restreamer-ui:ingest:"),
        "input": [],
        "output": [],
        "options": [],
        "autostart": true,
        "reconnect": true,
        "metadata": {
            "restreamer-ui": { "meta": { "name": name } }
        }
    })
}

pub fn running_state_json() -> serde_json::Value {
    json!({
        "order": "start",
        "exec": "running",
        "runtime_seconds": 42,
        "progress": { "fps": 25.0, "bitrate_kbit": 1500.5 },
        "memory_bytes": 52428800u64,
        "cpu_usage": 3.5
    })
}
