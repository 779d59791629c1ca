//! Authenticated client for the Restreamer Core API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use streamgate_common::{Error, Result, StreamId, CONTROL_PLANE};
use tracing::debug;

use crate::session::{AuthBackend, Session, TokenPair};
use crate::types::{
    Command, CommandRequest, LoginRequest, LoginResponse, Process, ProcessConfig, ProcessState,
    RefreshResponse,
};

/// Per-request timeout for control-plane calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// A request is attempted at most this often; only a 401 triggers the retry.
const MAX_ATTEMPTS: u32 = 2;

/// Characters escaped in a process id path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Connection settings for [`RestreamerClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A control-plane call, rebuilt on every attempt.
struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: String) -> Self {
        Self {
            method,
            path,
            body: None,
        }
    }

    fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::internal(format!("failed to encode request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// Client for the Restreamer process API.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct RestreamerClient {
    http: Client,
    base_url: String,
    session: Session,
}

impl RestreamerClient {
    pub fn new(config: ClientConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let backend = HttpAuthBackend {
            http: http.clone(),
            base_url: base_url.clone(),
            username: config.username,
            password: config.password,
        };

        Self {
            http,
            base_url,
            session: Session::new(backend),
        }
    }

    /// Configured control-plane base URL, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Public HLS playlist URL of a stream.
    pub fn hls_url(&self, stream_id: &StreamId) -> String {
        format!("{}/memfs/{}.m3u8", self.base_url, stream_id)
    }

    /// Establish a session without issuing a process call.
    pub async fn authenticate(&self) -> Result<()> {
        self.session.acquire_token().await.map(|_| ())
    }

    pub async fn create_process(&self, config: &ProcessConfig) -> Result<Process> {
        let request =
            ApiRequest::new(Method::POST, "/api/v3/process".to_string()).with_json(config)?;
        decode(&self.execute(request).await?)
    }

    pub async fn get_process(&self, id: &str) -> Result<Process> {
        let request = ApiRequest::new(Method::GET, process_path(id, "")?);
        decode(&self.execute(request).await?)
    }

    pub async fn list_processes(&self) -> Result<Vec<Process>> {
        let request = ApiRequest::new(Method::GET, "/api/v3/process".to_string());
        let body = self.execute(request).await?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        decode(&body)
    }

    pub async fn get_process_state(&self, id: &str) -> Result<ProcessState> {
        let request = ApiRequest::new(Method::GET, process_path(id, "/state")?);
        decode(&self.execute(request).await?)
    }

    pub async fn delete_process(&self, id: &str) -> Result<()> {
        let request = ApiRequest::new(Method::DELETE, process_path(id, "")?);
        self.execute(request).await.map(|_| ())
    }

    pub async fn command_process(&self, id: &str, command: Command) -> Result<()> {
        let request = ApiRequest::new(Method::PUT, process_path(id, "/command")?)
            .with_json(&CommandRequest { command })?;
        self.execute(request).await.map(|_| ())
    }

    /// Store `value` under `key` in the process metadata.
    pub async fn set_metadata<T: Serialize>(&self, id: &str, key: &str, value: &T) -> Result<()> {
        if key.trim().is_empty() {
            return Err(Error::validation("metadata key is required"));
        }
        let suffix = format!("/metadata/{}", utf8_percent_encode(key, PATH_SEGMENT));
        let request = ApiRequest::new(Method::PUT, process_path(id, &suffix)?).with_json(value)?;
        self.execute(request).await.map(|_| ())
    }

    /// Run `request` with a session token, retrying once after a 401.
    async fn execute(&self, request: ApiRequest) -> Result<Bytes> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let token = self.session.acquire_token().await?;
            let response = self.send(&request, &token).await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                self.session.invalidate(&token);
                if attempt < MAX_ATTEMPTS {
                    debug!(path = %request.path, "Control plane rejected token, retrying");
                    continue;
                }
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| Error::gateway(CONTROL_PLANE, e))?;
            if status.as_u16() >= 400 {
                return Err(Error::control_plane(
                    status.as_u16(),
                    String::from_utf8_lossy(&body),
                ));
            }
            return Ok(body);
        }
    }

    async fn send(&self, request: &ApiRequest, token: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| {
            debug!(method = %request.method, path = %request.path, error = %e, "Control plane request failed");
            Error::gateway(CONTROL_PLANE, e)
        })
    }
}

/// Shared handle used by the HTTP layer.
pub type SharedClient = Arc<RestreamerClient>;

fn process_path(id: &str, suffix: &str) -> Result<String> {
    if id.trim().is_empty() {
        return Err(Error::validation("process id is required"));
    }
    Ok(format!(
        "/api/v3/process/{}{suffix}",
        utf8_percent_encode(id, PATH_SEGMENT)
    ))
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| Error::gateway(CONTROL_PLANE, format!("undecodable response: {e}")))
}

// ---------------------------------------------------------------------------
// Login endpoints
// ---------------------------------------------------------------------------

struct HttpAuthBackend {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpAuthBackend {
    async fn read_json<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T> {
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "Control plane {what} rejected");
            return Err(Error::control_plane(status.as_u16(), body));
        }
        response
            .json()
            .await
            .map_err(|e| Error::auth(format!("undecodable {what} response: {e}")))
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn login(&self) -> Result<TokenPair> {
        let response = self
            .http
            .post(format!("{}/api/login", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| Error::gateway(CONTROL_PLANE, e))?;

        let login: LoginResponse = Self::read_json(response, "login").await?;
        Ok(TokenPair {
            access_token: login.access_token,
            refresh_token: login.refresh_token,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/api/login/refresh", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(refresh_token)
            .send()
            .await
            .map_err(|e| Error::gateway(CONTROL_PLANE, e))?;

        let refreshed: RefreshResponse = Self::read_json(response, "refresh").await?;
        Ok(refreshed.access_token)
    }
}
