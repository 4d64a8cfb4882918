//! Client-side failures and what to tell the user about them.

use api::{AuthError, ExchangeError, RefreshError, RevokeError};
use store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("Not signed in")]
    NotAuthenticated,

    /// A login completion arrived for an attempt that is no longer current.
    #[error("Result belongs to a login attempt that is no longer current")]
    StaleAttempt,

    #[error("Sign-in did not complete in time")]
    LoginTimedOut,

    #[error("Could not open the sign-in page: {0}")]
    Navigation(String),

    /// The stored or received credential could not be decoded.
    #[error("Session credential is unusable: {0}")]
    Credential(String),

    #[error("{event} is not allowed while {from}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    #[error("Could not reach the Taskboard server: {0}")]
    Unreachable(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Rejected(#[from] AuthError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error(transparent)]
    Revoke(#[from] RevokeError),
}

impl ClientError {
    /// A sentence suitable for a banner or toast.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotAuthenticated | Self::Rejected(_) => "Please sign in to continue.",
            Self::StaleAttempt => "That sign-in was replaced by a newer one.",
            Self::LoginTimedOut => "Sign-in took too long. Please try again.",
            Self::Navigation(_) => {
                "We couldn't open the Google sign-in page. Check pop-up or browser settings and try again."
            }
            Self::Credential(_) => "Your saved session was unreadable. Please sign in again.",
            Self::InvalidTransition { .. } => "That action isn't available right now.",
            Self::Unreachable(_) => "Taskboard is unreachable. Check your connection and try again.",
            Self::Storage(_) => "Your session could not be saved on this device.",
            Self::Exchange(ExchangeError::InvalidState) => {
                "Sign-in could not be verified. Please start again from the sign-in page."
            }
            Self::Exchange(ExchangeError::InvalidGrant(_)) => {
                "Google did not approve the sign-in. Please try again."
            }
            Self::Exchange(ExchangeError::UpstreamUnavailable(_))
            | Self::Refresh(RefreshError::UpstreamUnavailable(_))
            | Self::Revoke(RevokeError::UpstreamUnavailable(_)) => {
                "Google is not responding right now. Please try again in a moment."
            }
            Self::Refresh(_) => "Your session has ended. Please sign in again.",
            Self::Revoke(RevokeError::InvalidCredential) => "You have been signed out.",
        }
    }

    /// Worth offering a "try again" button.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_)
                | Self::LoginTimedOut
                | Self::Navigation(_)
                | Self::Exchange(ExchangeError::UpstreamUnavailable(_))
                | Self::Refresh(RefreshError::UpstreamUnavailable(_))
                | Self::Revoke(RevokeError::UpstreamUnavailable(_))
        )
    }
}
