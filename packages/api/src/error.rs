//! # Error taxonomy shared by the backend and its clients
//!
//! Every failure that crosses the wire has a stable snake_case code. The backend puts
//! the code in the `error` field of an [`ErrorBody`] (or in the `error` query parameter
//! of the login redirect) and the client maps it back with `from_code`, so a rejection
//! is never flattened into a bare "not signed in".
//!
//! | Enum | Raised by | Codes |
//! |------|-----------|-------|
//! | [`ExchangeError`] | code exchange on `/auth/callback` | `invalid_state`, `invalid_grant`, `upstream_unavailable` |
//! | [`AuthError`] | credential validation on protected routes | `unauthenticated`, `invalid_signature`, `expired` |
//! | [`RefreshError`] | `/auth/refresh` | `invalid_signature`, `no_refresh_token`, `invalid_grant`, `upstream_unavailable` |
//! | [`RevokeError`] | `/auth/revoke` | `invalid_credential`, `upstream_unavailable` |

use serde::{Deserialize, Serialize};

/// Failure to turn an authorization code into a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    /// The anti-forgery state was missing, unknown, expired or already used.
    #[error("Sign-in state is invalid or was already used")]
    InvalidState,

    /// The provider rejected the authorization code.
    #[error("Authorization grant rejected: {0}")]
    InvalidGrant(String),

    /// The provider could not be reached or answered with garbage.
    #[error("Identity provider unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl ExchangeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidState => "invalid_state",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }

    /// Map a wire code back to an error. Unknown codes fail closed as `InvalidState`.
    pub fn from_code(code: &str, detail: impl Into<String>) -> Self {
        match code {
            "invalid_grant" => Self::InvalidGrant(detail.into()),
            "upstream_unavailable" => Self::UpstreamUnavailable(detail.into()),
            _ => Self::InvalidState,
        }
    }

    /// Only outages are worth retrying; the other variants need a fresh login.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(_))
    }
}

/// Rejection of a credential presented to a protected route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("No session credential was presented")]
    Unauthenticated,

    #[error("Session credential signature is invalid")]
    InvalidSignature,

    #[error("Session credential has expired")]
    Expired,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "unauthenticated" => Some(Self::Unauthenticated),
            "invalid_signature" => Some(Self::InvalidSignature),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// Failure to renew a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("Session credential signature is invalid")]
    InvalidSignature,

    #[error("Session has no refresh token")]
    NoRefreshToken,

    #[error("Refresh grant rejected: {0}")]
    InvalidGrant(String),

    #[error("Identity provider unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl RefreshError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid_signature",
            Self::NoRefreshToken => "no_refresh_token",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }

    /// Unknown codes are treated as an outage so the stored credential survives.
    pub fn from_code(code: &str, detail: impl Into<String>) -> Self {
        match code {
            "invalid_signature" => Self::InvalidSignature,
            "no_refresh_token" => Self::NoRefreshToken,
            "invalid_grant" => Self::InvalidGrant(detail.into()),
            _ => Self::UpstreamUnavailable(detail.into()),
        }
    }

    /// `true` when the session can never be renewed and must be discarded.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::UpstreamUnavailable(_))
    }
}

/// Failure to revoke a session at the provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevokeError {
    #[error("Session credential is invalid")]
    InvalidCredential,

    #[error("Identity provider unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl RevokeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "invalid_credential",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }

    pub fn from_code(code: &str, detail: impl Into<String>) -> Self {
        match code {
            "invalid_credential" => Self::InvalidCredential,
            _ => Self::UpstreamUnavailable(detail.into()),
        }
    }
}

/// JSON error body returned by every `/auth/*` and protected route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: code.to_string(),
            message: message.into(),
        }
    }
}
