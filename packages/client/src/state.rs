//! # Client authentication state machine
//!
//! [`AuthState`] is a plain value; [`AuthState::apply`] is the only way to move it.
//! Anything not in the table below is refused with
//! [`ClientError::InvalidTransition`] and leaves the state as it was.
//!
//! | From | Event | To |
//! |------|-------|----|
//! | `Unauthenticated` | `LoginStarted` | `Authenticating` |
//! | `Authenticating(a)` | `LoginSucceeded(a)` | `Authenticated` |
//! | `Authenticating(a)` | `LoginFailed(a)` | `Error` |
//! | `Authenticating(a)` | `LoginCancelled(a)` | `Unauthenticated` |
//! | `Unauthenticated` | `Restored` | `Authenticated` |
//! | `Authenticated` | `RefreshStarted` | `Refreshing` |
//! | `Refreshing` | `RefreshSucceeded` / `RefreshAborted` | `Authenticated` |
//! | any | `SessionEnded` | `Unauthenticated` |
//! | any | `Failed` | `Error` |
//! | `Error` | `Acknowledged` | `Unauthenticated` |
//!
//! Login completions carry the [`AttemptId`] they belong to. A completion for any
//! attempt other than the one in progress is [`ClientError::StaleAttempt`].

use std::fmt;

use api::IdentityClaims;
use chrono::{DateTime, Utc};

use crate::error::ClientError;

/// Identifies one login attempt. Monotonic per [`AuthStore`](crate::AuthStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(pub(crate) u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating {
        redirect_target: String,
        attempt: AttemptId,
        started_at: DateTime<Utc>,
    },
    Authenticated {
        claims: IdentityClaims,
    },
    Refreshing {
        previous: IdentityClaims,
    },
    Error {
        reason: ClientError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    LoginStarted {
        redirect_target: String,
        attempt: AttemptId,
        started_at: DateTime<Utc>,
    },
    LoginSucceeded {
        attempt: AttemptId,
        claims: IdentityClaims,
    },
    LoginFailed {
        attempt: AttemptId,
        reason: ClientError,
    },
    LoginCancelled {
        attempt: AttemptId,
    },
    Restored {
        claims: IdentityClaims,
    },
    RefreshStarted,
    RefreshSucceeded {
        claims: IdentityClaims,
    },
    /// The refresh could not reach the provider but the old credential is still good.
    RefreshAborted {
        claims: IdentityClaims,
    },
    SessionEnded,
    Failed {
        reason: ClientError,
    },
    Acknowledged,
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoginStarted { .. } => "login_started",
            Self::LoginSucceeded { .. } => "login_succeeded",
            Self::LoginFailed { .. } => "login_failed",
            Self::LoginCancelled { .. } => "login_cancelled",
            Self::Restored { .. } => "restored",
            Self::RefreshStarted => "refresh_started",
            Self::RefreshSucceeded { .. } => "refresh_succeeded",
            Self::RefreshAborted { .. } => "refresh_aborted",
            Self::SessionEnded => "session_ended",
            Self::Failed { .. } => "failed",
            Self::Acknowledged => "acknowledged",
        }
    }

    fn attempt(&self) -> Option<AttemptId> {
        match self {
            Self::LoginSucceeded { attempt, .. }
            | Self::LoginFailed { attempt, .. }
            | Self::LoginCancelled { attempt } => Some(*attempt),
            _ => None,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::Unauthenticated
    }
}

impl AuthState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating { .. } => "authenticating",
            Self::Authenticated { .. } => "authenticated",
            Self::Refreshing { .. } => "refreshing",
            Self::Error { .. } => "error",
        }
    }

    /// Signed in, including while a refresh is in flight.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. } | Self::Refreshing { .. })
    }

    pub fn claims(&self) -> Option<&IdentityClaims> {
        match self {
            Self::Authenticated { claims } => Some(claims),
            Self::Refreshing { previous } => Some(previous),
            _ => None,
        }
    }

    pub fn attempt(&self) -> Option<AttemptId> {
        match self {
            Self::Authenticating { attempt, .. } => Some(*attempt),
            _ => None,
        }
    }

    /// The state after `event`, or why `event` is not allowed here.
    pub fn apply(&self, event: AuthEvent) -> Result<AuthState, ClientError> {
        if let Some(completed) = event.attempt() {
            if self.attempt() != Some(completed) {
                return Err(ClientError::StaleAttempt);
            }
        }

        match (self, event) {
            (
                Self::Unauthenticated,
                AuthEvent::LoginStarted {
                    redirect_target,
                    attempt,
                    started_at,
                },
            ) => Ok(Self::Authenticating {
                redirect_target,
                attempt,
                started_at,
            }),
            (Self::Authenticating { .. }, AuthEvent::LoginSucceeded { claims, .. }) => {
                Ok(Self::Authenticated { claims })
            }
            (Self::Authenticating { .. }, AuthEvent::LoginFailed { reason, .. }) => {
                Ok(Self::Error { reason })
            }
            (Self::Authenticating { .. }, AuthEvent::LoginCancelled { .. }) => {
                Ok(Self::Unauthenticated)
            }
            (Self::Unauthenticated, AuthEvent::Restored { claims }) => {
                Ok(Self::Authenticated { claims })
            }
            (Self::Authenticated { claims }, AuthEvent::RefreshStarted) => Ok(Self::Refreshing {
                previous: claims.clone(),
            }),
            (Self::Refreshing { .. }, AuthEvent::RefreshSucceeded { claims })
            | (Self::Refreshing { .. }, AuthEvent::RefreshAborted { claims }) => {
                Ok(Self::Authenticated { claims })
            }
            (_, AuthEvent::SessionEnded) => Ok(Self::Unauthenticated),
            (_, AuthEvent::Failed { reason }) => Ok(Self::Error { reason }),
            (Self::Error { .. }, AuthEvent::Acknowledged) => Ok(Self::Unauthenticated),
            (from, event) => Err(ClientError::InvalidTransition {
                from: from.name(),
                event: event.name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::ExchangeError;
    use chrono::{Duration, TimeZone};

    fn claims(sub: &str) -> IdentityClaims {
        let iat = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        IdentityClaims::new(
            sub.into(),
            format!("{sub}@example.com"),
            None,
            None,
            iat,
            iat + Duration::hours(1),
        )
    }

    fn authenticating(attempt: u64) -> AuthState {
        AuthState::Authenticating {
            redirect_target: "/boards".into(),
            attempt: AttemptId(attempt),
            started_at: Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_login_happy_path() {
        let started = AuthState::Unauthenticated
            .apply(AuthEvent::LoginStarted {
                redirect_target: "/boards".into(),
                attempt: AttemptId(1),
                started_at: Utc::now(),
            })
            .unwrap();
        assert_eq!(started.attempt(), Some(AttemptId(1)));

        let done = started
            .apply(AuthEvent::LoginSucceeded {
                attempt: AttemptId(1),
                claims: claims("ada"),
            })
            .unwrap();
        assert!(done.is_authenticated());
        assert_eq!(done.claims().unwrap().subject_id, "ada");
    }

    #[test]
    fn test_stale_completion_is_refused() {
        let state = authenticating(2);
        for event in [
            AuthEvent::LoginSucceeded {
                attempt: AttemptId(1),
                claims: claims("ada"),
            },
            AuthEvent::LoginFailed {
                attempt: AttemptId(1),
                reason: ExchangeError::InvalidState.into(),
            },
            AuthEvent::LoginCancelled {
                attempt: AttemptId(3),
            },
        ] {
            assert_eq!(state.apply(event), Err(ClientError::StaleAttempt));
        }

        // Completions with nothing in progress are stale too.
        assert_eq!(
            AuthState::Unauthenticated.apply(AuthEvent::LoginSucceeded {
                attempt: AttemptId(1),
                claims: claims("ada"),
            }),
            Err(ClientError::StaleAttempt)
        );
    }

    #[test]
    fn test_exchange_failure_then_acknowledge() {
        let failed = authenticating(1)
            .apply(AuthEvent::LoginFailed {
                attempt: AttemptId(1),
                reason: ExchangeError::InvalidState.into(),
            })
            .unwrap();
        assert_eq!(failed.name(), "error");

        let back = failed.apply(AuthEvent::Acknowledged).unwrap();
        assert_eq!(back, AuthState::Unauthenticated);
    }

    #[test]
    fn test_refresh_cycle() {
        let authed = AuthState::Authenticated {
            claims: claims("ada"),
        };
        let refreshing = authed.apply(AuthEvent::RefreshStarted).unwrap();
        assert!(refreshing.is_authenticated());
        assert_eq!(refreshing.claims().unwrap().subject_id, "ada");

        let renewed = refreshing
            .apply(AuthEvent::RefreshSucceeded {
                claims: claims("ada"),
            })
            .unwrap();
        assert!(matches!(renewed, AuthState::Authenticated { .. }));

        let aborted = authed
            .apply(AuthEvent::RefreshStarted)
            .unwrap()
            .apply(AuthEvent::RefreshAborted {
                claims: claims("ada"),
            })
            .unwrap();
        assert_eq!(aborted, authed);
    }

    #[test]
    fn test_session_end_and_failure_from_anywhere() {
        let states = [
            AuthState::Unauthenticated,
            authenticating(1),
            AuthState::Authenticated {
                claims: claims("ada"),
            },
            AuthState::Refreshing {
                previous: claims("ada"),
            },
            AuthState::Error {
                reason: ClientError::LoginTimedOut,
            },
        ];
        for state in states {
            assert_eq!(
                state.apply(AuthEvent::SessionEnded),
                Ok(AuthState::Unauthenticated)
            );
            assert!(matches!(
                state.apply(AuthEvent::Failed {
                    reason: ClientError::NotAuthenticated
                }),
                Ok(AuthState::Error { .. })
            ));
        }
    }

    #[test]
    fn test_everything_else_is_invalid() {
        let authed = AuthState::Authenticated {
            claims: claims("ada"),
        };
        assert_eq!(
            authed.apply(AuthEvent::LoginStarted {
                redirect_target: "/".into(),
                attempt: AttemptId(9),
                started_at: Utc::now(),
            }),
            Err(ClientError::InvalidTransition {
                from: "authenticated",
                event: "login_started",
            })
        );
        assert!(AuthState::Unauthenticated
            .apply(AuthEvent::RefreshStarted)
            .is_err());
        assert!(AuthState::Unauthenticated
            .apply(AuthEvent::Acknowledged)
            .is_err());
        assert!(AuthState::Error {
            reason: ClientError::LoginTimedOut
        }
        .apply(AuthEvent::LoginStarted {
            redirect_target: "/".into(),
            attempt: AttemptId(1),
            started_at: Utc::now(),
        })
        .is_err());
        assert!(authed
            .apply(AuthEvent::Restored {
                claims: claims("eve")
            })
            .is_err());
    }
}
