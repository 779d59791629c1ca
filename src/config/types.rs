use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub restreamer: RestreamerConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed to call the management API (empty = any origin)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// API key required for `/api/streams` (unset = open)
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            api_key: None,
        }
    }
}

/// Connection to the Restreamer control plane.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestreamerConfig {
    #[serde(default = "default_restreamer_url")]
    pub url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_restreamer_timeout")]
    pub timeout_secs: u64,
}

fn default_restreamer_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_restreamer_timeout() -> u64 {
    15
}

impl RestreamerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl Default for RestreamerConfig {
    fn default() -> Self {
        Self {
            url: default_restreamer_url(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_restreamer_timeout(),
        }
    }
}

/// Same-origin HLS proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Path the proxy is mounted at; also the prefix of rewritten manifest URIs
    #[serde(default = "default_public_path")]
    pub public_path: String,

    #[serde(default = "default_proxy_timeout")]
    pub timeout_secs: u64,

    /// Upstream bodies beyond this size are truncated
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Redirect hops followed per fetch; one more fails the fetch
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_public_path() -> String {
    "/stream-proxy".to_string()
}
fn default_proxy_timeout() -> u64 {
    10
}
fn default_max_body_bytes() -> usize {
    50 * 1024 * 1024
}
fn default_max_redirects() -> usize {
    5
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            public_path: default_public_path(),
            timeout_secs: default_proxy_timeout(),
            max_body_bytes: default_max_body_bytes(),
            max_redirects: default_max_redirects(),
        }
    }
}

/// Admission window for stream creation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_max_requests() -> usize {
    10
}
fn default_window_secs() -> u64 {
    60
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}
