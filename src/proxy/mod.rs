//! Bounded upstream fetching for the same-origin HLS proxy.
//!
//! [`StreamProxy`] validates the requested URL, fetches it with a timeout,
//! redirect cap and body size cap, and rewrites playlists so that every
//! reference they contain points back at the proxy.

use std::borrow::Cow;

use bytes::{Bytes, BytesMut};
use reqwest::{redirect, Client};
use streamgate_common::{Error, Result, UPSTREAM};
use streamgate_hls::{is_manifest, rewrite_manifest, HLS_MIME_TYPE};
use url::Url;

use crate::config::ProxyConfig;

/// Cache policy for playlists, which change every segment.
pub const MANIFEST_CACHE_CONTROL: &str = "no-cache";

/// Cache policy for media segments.
pub const SEGMENT_CACHE_CONTROL: &str = "public, max-age=60";

/// A fetched (and possibly rewritten) upstream resource.
#[derive(Debug, Clone)]
pub struct ProxiedResource {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub is_manifest: bool,
    pub truncated: bool,
}

impl ProxiedResource {
    /// Content type to send downstream.
    pub fn content_type(&self) -> Option<&str> {
        match (&self.content_type, self.is_manifest) {
            (Some(ct), _) => Some(ct.as_str()),
            (None, true) => Some(HLS_MIME_TYPE),
            (None, false) => None,
        }
    }

    pub fn cache_control(&self) -> &'static str {
        if self.is_manifest {
            MANIFEST_CACHE_CONTROL
        } else {
            SEGMENT_CACHE_CONTROL
        }
    }
}

pub struct StreamProxy {
    http: Client,
    public_path: String,
    max_body_bytes: usize,
}

impl StreamProxy {
    pub fn new(config: &ProxyConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout())
            // `limited` counts the initial request as well.
            .redirect(redirect::Policy::limited(config.max_redirects.saturating_add(1)))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            http,
            public_path: config.public_path.clone(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Path the proxy is served at.
    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    /// Fetch `target`, forwarding only the caller's `User-Agent`.
    pub async fn fetch(&self, target: &Url, user_agent: Option<&str>) -> Result<ProxiedResource> {
        let mut request = self.http.get(target.as_str());
        if let Some(ua) = user_agent {
            request = request.header(reqwest::header::USER_AGENT, ua);
        }

        let mut response = request.send().await.map_err(|e| {
            tracing::warn!(url = %target, error = %e, "Upstream fetch failed");
            Error::gateway(UPSTREAM, e)
        })?;

        let status = response.status().as_u16();
        if !(200..400).contains(&status) {
            tracing::warn!(url = %target, status, "Upstream error status");
            return Err(Error::Upstream { status });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = BytesMut::new();
        let mut truncated = false;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::gateway(UPSTREAM, e))?
        {
            let room = self.max_body_bytes - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }
        if truncated {
            tracing::warn!(
                url = %target,
                limit = self.max_body_bytes,
                "Upstream body exceeds size limit, truncated"
            );
        }

        let manifest = is_manifest(target.as_str(), content_type.as_deref());
        let body = body.freeze();
        let rewritten = if manifest {
            match rewrite_manifest(&body, target.as_str(), &self.public_path) {
                Cow::Owned(rewritten) => Some(rewritten),
                Cow::Borrowed(_) => None,
            }
        } else {
            None
        };
        let body = rewritten.map(Bytes::from).unwrap_or(body);

        Ok(ProxiedResource {
            body,
            content_type,
            is_manifest: manifest,
            truncated,
        })
    }
}

/// Validate the `url` query value of a proxy request.
pub fn parse_target(raw: Option<&str>) -> Result<Url> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::validation("missing url parameter"))?;

    let url = Url::parse(raw).map_err(|_| Error::validation("invalid url: only http/https allowed"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::validation("invalid url: only http/https allowed"));
    }
    Ok(url)
}
