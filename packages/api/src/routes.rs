//! # HTTP surface
//!
//! | Route | Handler | Success | Failure |
//! |-------|---------|---------|---------|
//! | `GET /auth/login?return_to=` | [`LoginInitiator::begin`] | `200` [`LoginStart`] | `400`/`503` [`ErrorBody`] |
//! | `GET /auth/callback?code&state[&error]` | [`CallbackExchanger::exchange_code`] | `303` to `{APP_URL}{return_to}#credential=…` | `303` to `{APP_URL}/login?error=<code>` |
//! | `POST /auth/refresh` (bearer) | [`SessionRefresher::refresh`] | `200` [`SessionResponse`] | `400`/`401`/`503` [`ErrorBody`] |
//! | `POST /auth/revoke` (bearer) | [`SessionRevoker::revoke`] | `204` | `401`/`503` [`ErrorBody`] |
//! | `GET /api/auth/me` (bearer) | [`Authenticated`] extractor | `200` [`IdentityClaims`] | `401` [`ErrorBody`] |
//!
//! The credential is delivered in the URL fragment so it never reaches a server log
//! or a `Referer` header.

use std::sync::Arc;

use axum::extract::{FromRef, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{
    bearer_token, AuthMiddleware, Authenticated, CallbackExchanger, IdentityProvider, LoginError,
    LoginInitiator, PendingLoginStore, SessionRefresher, SessionRevoker, SessionSettings,
    SessionSigner,
};
use crate::clock::Clock;
use crate::error::{ErrorBody, ExchangeError, RefreshError, RevokeError};
use crate::models::{IdentityClaims, LoginStart, SessionResponse};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub login: Arc<LoginInitiator>,
    pub exchanger: Arc<CallbackExchanger>,
    pub refresher: Arc<SessionRefresher>,
    pub revoker: Arc<SessionRevoker>,
    pub middleware: Arc<AuthMiddleware>,
    pub app_url: Url,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        pending: Arc<dyn PendingLoginStore>,
        settings: SessionSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let signer = Arc::new(SessionSigner::new(
            settings.keys,
            settings.ttl,
            clock.clone(),
        ));

        Self {
            login: Arc::new(LoginInitiator::new(
                provider.clone(),
                pending.clone(),
                clock.clone(),
            )),
            exchanger: Arc::new(CallbackExchanger::new(
                provider.clone(),
                pending,
                signer.clone(),
                clock.clone(),
            )),
            refresher: Arc::new(SessionRefresher::new(provider.clone(), signer.clone())),
            revoker: Arc::new(SessionRevoker::new(provider, signer.clone())),
            middleware: Arc::new(AuthMiddleware::new(signer, clock)),
            app_url: settings.app_url,
        }
    }

    fn app_link(&self, path_and_rest: &str) -> String {
        format!(
            "{}{}",
            self.app_url.as_str().trim_end_matches('/'),
            path_and_rest
        )
    }
}

impl FromRef<AppState> for Arc<AuthMiddleware> {
    fn from_ref(state: &AppState) -> Self {
        state.middleware.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .route("/auth/refresh", post(refresh))
        .route("/auth/revoke", post(revoke))
        .route("/api/auth/me", get(me))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LoginParams {
    #[serde(default)]
    return_to: String,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
) -> Result<Json<LoginStart>, LoginError> {
    let start = state.login.begin(&params.return_to).await?;
    Ok(Json(start))
}

async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let result = match (params.error, params.state) {
        (Some(provider_error), pending_state) => Err(state
            .exchanger
            .reject(pending_state.as_deref(), &provider_error)
            .await),
        (None, Some(pending_state)) => {
            let code = params.code.unwrap_or_default();
            state.exchanger.exchange_code(&code, &pending_state).await
        }
        (None, None) => Err(ExchangeError::InvalidState),
    };

    match result {
        Ok(done) => {
            let target = state.app_link(&format!(
                "{}#credential={}",
                done.return_to,
                done.credential.encode()
            ));
            Redirect::to(&target)
        }
        Err(e) => {
            warn!(error = e.code(), "Login callback rejected: {}", e);
            Redirect::to(&state.app_link(&format!("/login?error={}", e.code())))
        }
    }
}

async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, RefreshError> {
    let token = bearer_token(&headers).ok_or(RefreshError::InvalidSignature)?;
    let credential = state.refresher.refresh(token).await.inspect_err(|e| {
        warn!(error = e.code(), "Refresh failed: {}", e);
    })?;

    Ok(Json(SessionResponse {
        expires_at: credential.expires_at,
        credential: credential.encode(),
    }))
}

async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, RevokeError> {
    let token = bearer_token(&headers).ok_or(RevokeError::InvalidCredential)?;
    state.revoker.revoke(token).await.inspect_err(|e| {
        warn!(error = e.code(), "Revoke failed: {}", e);
    })?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(Authenticated { context, claims }: Authenticated) -> Json<IdentityClaims> {
    debug!(request_id = context.request_id(), subject = %claims.subject_id, "Identity lookup");
    Json(claims)
}

fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    (status, Json(ErrorBody::new(code, message))).into_response()
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::InvalidReturnPath(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        error_response(status, self.code(), self.to_string())
    }
}

impl IntoResponse for RefreshError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::InvalidSignature | Self::InvalidGrant(_) => StatusCode::UNAUTHORIZED,
            Self::NoRefreshToken => StatusCode::BAD_REQUEST,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        error_response(status, self.code(), self.to_string())
    }
}

impl IntoResponse for RevokeError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::InvalidCredential => StatusCode::UNAUTHORIZED,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status.is_server_error() {
            info!("Provider revocation unavailable, client will still log out");
        }
        error_response(status, self.code(), self.to_string())
    }
}
