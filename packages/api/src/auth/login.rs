//! Starting a login: anti-forgery state, PKCE, and the provider URL.

use std::sync::Arc;

use chrono::Duration;
use oauth2::{CsrfToken, PkceCodeChallenge};
use tracing::info;

use super::pending::{PendingLogin, PendingLoginStore, PendingStoreError, PENDING_LOGIN_TTL_MINUTES};
use super::provider::IdentityProvider;
use crate::clock::Clock;
use crate::models::LoginStart;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("Return path {0:?} is not a local path")]
    InvalidReturnPath(String),

    #[error(transparent)]
    Store(#[from] PendingStoreError),
}

impl LoginError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidReturnPath(_) => "invalid_return_to",
            Self::Store(_) => "upstream_unavailable",
        }
    }
}

/// Accept only same-origin absolute paths without a fragment (the credential is
/// delivered in one). An empty path means `/`.
pub fn validate_return_path(path: &str) -> Result<String, LoginError> {
    if path.is_empty() {
        return Ok("/".to_string());
    }

    let local = path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.contains('#')
        && !path.chars().any(char::is_control);

    if local {
        Ok(path.to_string())
    } else {
        Err(LoginError::InvalidReturnPath(path.to_string()))
    }
}

pub struct LoginInitiator {
    provider: Arc<dyn IdentityProvider>,
    pending: Arc<dyn PendingLoginStore>,
    clock: Arc<dyn Clock>,
}

impl LoginInitiator {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        pending: Arc<dyn PendingLoginStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            pending,
            clock,
        }
    }

    /// Record a pending login and build the URL that starts it.
    pub async fn begin(&self, return_to: &str) -> Result<LoginStart, LoginError> {
        let return_to = validate_return_path(return_to)?;
        let state = CsrfToken::new_random().secret().clone();
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let now = self.clock.now();

        self.pending
            .insert(PendingLogin {
                state: state.clone(),
                pkce_verifier: pkce_verifier.secret().clone(),
                return_to,
                created_at: now,
                expires_at: now + Duration::minutes(PENDING_LOGIN_TTL_MINUTES),
            })
            .await?;

        let authorization_url = self.provider.authorization_url(&state, pkce_challenge);
        info!("Login started");

        Ok(LoginStart {
            authorization_url,
            state,
        })
    }
}
