//! Common error type used throughout streamgate.
//!
//! Every failure is funnelled into [`Error`], which knows the HTTP status it
//! maps to ([`Error::http_status`]) and the message that is safe to show to
//! a caller ([`Error::public_message`]). The `Display` form carries the full
//! detail and is meant for logs only.

/// Service name used for control-plane gateway errors.
pub const CONTROL_PLANE: &str = "control plane";

/// Service name used for proxied stream origins.
pub const UPSTREAM: &str = "upstream";

/// Common error type for streamgate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or unsafe input, rejected before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A control-plane session could not be established.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The control plane answered with an error status.
    #[error("Control plane returned {status}: {message}")]
    ControlPlane {
        /// HTTP status returned by the control plane.
        status: u16,
        /// Trimmed response body.
        message: String,
    },

    /// No response at all from a remote service.
    #[error("{service} unreachable: {detail}")]
    Gateway {
        /// Which remote service failed (control plane, upstream).
        service: String,
        /// Transport-level detail, for logs only.
        detail: String,
    },

    /// A proxied upstream answered outside the 2xx/3xx range.
    #[error("Upstream returned status {status}")]
    Upstream {
        /// Status returned by the upstream origin.
        status: u16,
    },

    /// The caller exceeded the admission rate.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Auth error.
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a new ControlPlane error from a status and raw body.
    pub fn control_plane<S: AsRef<str>>(status: u16, body: S) -> Self {
        Self::ControlPlane {
            status,
            message: body.as_ref().trim().to_string(),
        }
    }

    /// Create a new Gateway error.
    pub fn gateway<S: Into<String>, D: std::fmt::Display>(service: S, detail: D) -> Self {
        Self::Gateway {
            service: service.into(),
            detail: detail.to_string(),
        }
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Map this error to the HTTP status returned to callers.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Auth(_) => 503,
            Error::ControlPlane { status, .. } => match status {
                404 => 404,
                409 => 409,
                502 => 502,
                401 | 403 => 503,
                s if (400..=599).contains(s) => *s,
                _ => 502,
            },
            Error::Gateway { .. } => 502,
            Error::Upstream { status } if (400..=599).contains(status) => *status,
            Error::Upstream { .. } => 502,
            Error::RateLimited => 429,
            Error::Internal(_) => 500,
        }
    }

    /// Message that may be shown to an end user.
    ///
    /// Never contains tokens, transport errors or control-plane addresses.
    pub fn public_message(&self) -> String {
        match self {
            Error::Validation(msg) => msg.clone(),
            Error::Auth(_) => "unable to authenticate with control plane".to_string(),
            Error::ControlPlane { status, message } => match status {
                404 => "stream not found".to_string(),
                409 => "stream already exists".to_string(),
                502 => "control plane unavailable".to_string(),
                401 | 403 => "unable to authenticate with control plane".to_string(),
                _ if message.is_empty() => format!("control plane returned {status}"),
                _ => message.clone(),
            },
            Error::Gateway { service, .. } => format!("{service} unavailable"),
            Error::Upstream { status } => format!("upstream returned {status}"),
            Error::RateLimited => "rate limit exceeded, try again later".to_string(),
            Error::Internal(_) => "internal error".to_string(),
        }
    }

    /// Short machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::Auth(_) => "auth_error",
            Error::ControlPlane { .. } => "control_plane_error",
            Error::Gateway { .. } => "gateway_error",
            Error::Upstream { .. } => "upstream_error",
            Error::RateLimited => "rate_limited",
            Error::Internal(_) => "internal_error",
        }
    }

    /// True when the control plane rejected the credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::ControlPlane { status: 401, .. })
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
