//! Control-plane session cell.
//!
//! [`Session`] owns the access/refresh token pair and hands out access tokens
//! through [`Session::acquire_token`]. Two locks are involved:
//!
//! - `state` (a `parking_lot` mutex) guards the token fields. It is held only
//!   to read or write them, never across an await point.
//! - `flight` (a `tokio` mutex) admits one login/refresh round trip at a time.
//!   Callers that queue behind it re-check `state` once admitted, so a burst
//!   of cache misses produces a single login.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use streamgate_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::jwt::token_expiry;

/// Tokens expiring within this margin are treated as already expired.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Access and refresh token returned by a login.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair").finish_non_exhaustive()
    }
}

/// Network side of a session: how tokens are obtained.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange credentials for a fresh token pair.
    async fn login(&self) -> Result<TokenPair>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<String>;
}

struct Token {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Token {
    fn new(value: String) -> Self {
        let expires_at = token_expiry(&value);
        Self { value, expires_at }
    }

    fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        !self.value.is_empty() && now + margin < self.expires_at
    }
}

#[derive(Default)]
struct SessionState {
    access: Option<Token>,
    refresh: Option<Token>,
}

/// Shared session with the control plane.
pub struct Session {
    backend: Box<dyn AuthBackend>,
    state: Mutex<SessionState>,
    flight: tokio::sync::Mutex<()>,
    margin: Duration,
}

impl Session {
    /// Create an empty session; the first [`acquire_token`](Self::acquire_token)
    /// logs in.
    pub fn new<B: AuthBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Box::new(backend),
            state: Mutex::new(SessionState::default()),
            flight: tokio::sync::Mutex::new(()),
            margin: Duration::seconds(EXPIRY_MARGIN_SECS),
        }
    }

    /// Return a usable access token, refreshing or logging in if needed.
    pub async fn acquire_token(&self) -> Result<String> {
        if let Some(token) = self.cached_access() {
            return Ok(token);
        }

        let _flight = self.flight.lock().await;
        if let Some(token) = self.cached_access() {
            return Ok(token);
        }

        if let Some(refresh_token) = self.cached_refresh() {
            match self.backend.refresh(&refresh_token).await {
                Ok(access_token) => {
                    let token = Token::new(access_token);
                    debug!(
                        access_expires = %token.expires_at.to_rfc3339(),
                        "Control plane token refreshed"
                    );
                    let value = token.value.clone();
                    self.state.lock().access = Some(token);
                    return Ok(value);
                }
                Err(e) => warn!(error = %e, "Control plane token refresh failed, attempting login"),
            }
        }

        let pair = self.backend.login().await.map_err(|e| match e {
            Error::Auth(_) => e,
            other => Error::auth(other.to_string()),
        })?;
        let access = Token::new(pair.access_token);
        let refresh = Token::new(pair.refresh_token);
        info!(
            access_expires = %access.expires_at.to_rfc3339(),
            refresh_expires = %refresh.expires_at.to_rfc3339(),
            "Control plane login successful"
        );

        let value = access.value.clone();
        let mut state = self.state.lock();
        state.access = Some(access);
        state.refresh = Some(refresh);
        Ok(value)
    }

    /// Drop the cached access token if it is still `rejected`.
    ///
    /// A token installed by another caller in the meantime is kept.
    pub fn invalidate(&self, rejected: &str) {
        let mut state = self.state.lock();
        if state.access.as_ref().is_some_and(|t| t.value == rejected) {
            debug!("Discarding rejected control plane access token");
            state.access = None;
        }
    }

    fn cached_access(&self) -> Option<String> {
        let now = Utc::now();
        self.state
            .lock()
            .access
            .as_ref()
            .filter(|t| t.is_fresh(now, self.margin))
            .map(|t| t.value.clone())
    }

    fn cached_refresh(&self) -> Option<String> {
        let now = Utc::now();
        self.state
            .lock()
            .refresh
            .as_ref()
            .filter(|t| t.is_fresh(now, self.margin))
            .map(|t| t.value.clone())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("margin", &self.margin)
            .finish_non_exhaustive()
    }
}
