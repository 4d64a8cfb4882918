//! # Request authentication
//!
//! [`AuthMiddleware::authenticate`] takes the per-request [`RequestContext`] and the
//! presented credential (if any) and either returns a new context carrying the
//! caller's [`IdentityClaims`] or fails with an [`AuthError`]. The incoming context is
//! never mutated.
//!
//! | Presented credential | Result |
//! |----------------------|--------|
//! | none | `Unauthenticated` |
//! | unparseable, or signature does not verify | `InvalidSignature` |
//! | valid signature, `now >= exp` | `Expired` |
//! | valid signature, `now < exp` | context with claims |
//!
//! Handlers normally use the [`Authenticated`] extractor, which pulls the bearer token
//! out of the `Authorization` header and rejects with a 401 JSON [`ErrorBody`].

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

use super::session::SessionSigner;
use crate::clock::Clock;
use crate::error::{AuthError, ErrorBody};
use crate::models::IdentityClaims;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request data threaded through handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
    identity: Option<IdentityClaims>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            identity: None,
        }
    }

    /// Use the caller's `x-request-id` when present, otherwise a new UUID.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self::new(request_id)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn identity(&self) -> Option<&IdentityClaims> {
        self.identity.as_ref()
    }

    fn with_identity(&self, claims: IdentityClaims) -> Self {
        Self {
            request_id: self.request_id.clone(),
            identity: Some(claims),
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub struct AuthMiddleware {
    signer: Arc<SessionSigner>,
    clock: Arc<dyn Clock>,
}

impl AuthMiddleware {
    pub fn new(signer: Arc<SessionSigner>, clock: Arc<dyn Clock>) -> Self {
        Self { signer, clock }
    }

    pub fn authenticate(
        &self,
        context: &RequestContext,
        credential: Option<&str>,
    ) -> Result<RequestContext, AuthError> {
        let token = credential.ok_or(AuthError::Unauthenticated)?;
        let credential = self.signer.verify(token)?;

        if credential.is_expired_at(self.clock.now()) {
            return Err(AuthError::Expired);
        }

        Ok(context.with_identity(credential.claims))
    }
}

/// A request whose bearer credential checked out.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub context: RequestContext,
    pub claims: IdentityClaims,
}

impl<S> FromRequestParts<S> for Authenticated
where
    Arc<AuthMiddleware>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let middleware = Arc::<AuthMiddleware>::from_ref(state);
        let context = RequestContext::from_headers(&parts.headers);

        let context = middleware
            .authenticate(&context, bearer_token(&parts.headers))
            .inspect_err(|e| {
                debug!(request_id = context.request_id(), "Rejected request: {}", e)
            })?;

        let claims = context
            .identity()
            .cloned()
            .ok_or(AuthError::Unauthenticated)?;

        Ok(Self { context, claims })
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let challenge = match self {
            Self::Unauthenticated => HeaderValue::from_static("Bearer"),
            Self::InvalidSignature => HeaderValue::from_static("Bearer error=\"invalid_token\""),
            Self::Expired => HeaderValue::from_static(
                "Bearer error=\"invalid_token\", error_description=\"expired\"",
            ),
        };
        let body = ErrorBody::new(self.code(), self.to_string());

        (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, challenge)],
            Json(body),
        )
            .into_response()
    }
}
