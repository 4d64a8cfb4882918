//! # Callback exchange: turning `code` + `state` into a session
//!
//! Order matters here. The pending login is taken (and so consumed) before the
//! provider is called, which means:
//!
//! - a replayed callback finds nothing and fails with `InvalidState`, even if the
//!   first attempt is still in flight;
//! - a failed provider call burns the state too, and the user starts over.
//!
//! | Outcome | Error |
//! |---------|-------|
//! | state unknown, used or expired | [`ExchangeError::InvalidState`] |
//! | provider said no, or returned an unusable identity | [`ExchangeError::InvalidGrant`] |
//! | provider or pending store unreachable | [`ExchangeError::UpstreamUnavailable`] |

use std::sync::Arc;

use tracing::{info, warn};

use super::pending::PendingLoginStore;
use super::provider::{IdentityProvider, ProviderError};
use super::session::SessionSigner;
use crate::clock::Clock;
use crate::credential::SessionCredential;
use crate::error::ExchangeError;

/// A freshly signed session and where the user wanted to go.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedLogin {
    pub credential: SessionCredential,
    pub return_to: String,
}

pub struct CallbackExchanger {
    provider: Arc<dyn IdentityProvider>,
    pending: Arc<dyn PendingLoginStore>,
    signer: Arc<SessionSigner>,
    clock: Arc<dyn Clock>,
}

impl CallbackExchanger {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        pending: Arc<dyn PendingLoginStore>,
        signer: Arc<SessionSigner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            pending,
            signer,
            clock,
        }
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
    ) -> Result<CompletedLogin, ExchangeError> {
        let login = self
            .pending
            .take(state, self.clock.now())
            .await
            .map_err(|e| ExchangeError::UpstreamUnavailable(e.to_string()))?
            .ok_or(ExchangeError::InvalidState)?;

        if code.is_empty() {
            return Err(ExchangeError::InvalidGrant("missing authorization code".into()));
        }

        let grant = self
            .provider
            .exchange_code(code, &login.pkce_verifier)
            .await
            .map_err(|e| match e {
                ProviderError::Rejected(detail) => ExchangeError::InvalidGrant(detail),
                ProviderError::Unavailable(detail) => ExchangeError::UpstreamUnavailable(detail),
            })?;

        let identity = grant
            .identity
            .ok_or_else(|| ExchangeError::InvalidGrant("provider returned no identity".into()))?;

        if grant.tokens.refresh_token.is_none() {
            warn!("Provider returned no refresh token; session will not be renewable");
        }

        let credential = self
            .signer
            .issue(
                self.signer.claims_for(&identity),
                grant.tokens.access_token,
                grant.tokens.refresh_token.as_deref(),
            )
            .map_err(|e| ExchangeError::UpstreamUnavailable(e.to_string()))?;

        info!("Session issued for subject {}", identity.subject_id);

        Ok(CompletedLogin {
            credential,
            return_to: login.return_to,
        })
    }

    /// The provider redirected back with `error=` instead of a code. The state is
    /// consumed all the same.
    pub async fn reject(&self, state: Option<&str>, provider_error: &str) -> ExchangeError {
        let Some(state) = state else {
            return ExchangeError::InvalidState;
        };

        match self.pending.take(state, self.clock.now()).await {
            Ok(Some(_)) => ExchangeError::InvalidGrant(provider_error.to_string()),
            Ok(None) => ExchangeError::InvalidState,
            Err(e) => ExchangeError::UpstreamUnavailable(e.to_string()),
        }
    }
}
