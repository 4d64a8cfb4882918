//! # Talking to the Taskboard backend
//!
//! [`AuthBackend`] is the client's view of the `/auth/*` routes and the identity
//! endpoint. [`HttpBackend`] implements it over `reqwest`. Error responses carry an
//! [`ErrorBody`] whose `error` code is mapped back onto the shared error enums, so
//! the client sees the same variant the server raised.
//!
//! | Method | Route | Errors |
//! |--------|-------|--------|
//! | `login_url` | `GET /auth/login?return_to=` | [`ClientError`] |
//! | `refresh` | `POST /auth/refresh` | [`RefreshError`] |
//! | `revoke` | `POST /auth/revoke` | [`RevokeError`] |
//! | `identity` | `GET /api/auth/me` | [`ClientError::Rejected`] on 401 |

use api::{
    AuthError, ErrorBody, ExchangeError, IdentityClaims, LoginStart, RefreshError, RevokeError,
    SessionResponse,
};
use reqwest::{Response, StatusCode};
use tracing::warn;
use url::Url;

use crate::error::ClientError;

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait AuthBackend: Send + Sync {
    async fn login_url(&self, return_to: &str) -> Result<LoginStart, ClientError>;

    async fn refresh(&self, credential: &str) -> Result<SessionResponse, RefreshError>;

    async fn revoke(&self, credential: &str) -> Result<(), RevokeError>;

    async fn identity(&self, credential: &str) -> Result<IdentityClaims, ClientError>;
}

pub struct HttpBackend {
    base: String,
    http: reqwest::Client,
}

impl HttpBackend {
    /// `base` is the backend origin, e.g. `https://tasks.example.com`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &store::ClientConfig) -> Self {
        Self::new(config.backend_base())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Read the `{ error, message }` body of a failed response. Bodies that do not parse
/// come back with an empty code so every `from_code` falls through to its default.
async fn error_body(response: Response) -> ErrorBody {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body,
        Err(_) => ErrorBody::new("", format!("HTTP {status}")),
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl AuthBackend for HttpBackend {
    async fn login_url(&self, return_to: &str) -> Result<LoginStart, ClientError> {
        let url = Url::parse_with_params(&self.endpoint("/auth/login"), &[("return_to", return_to)])
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;

        if response.status().is_success() {
            return response
                .json::<LoginStart>()
                .await
                .map_err(|e| ClientError::Unreachable(e.to_string()));
        }

        let body = error_body(response).await;
        warn!(error = %body.error, "Backend refused to start login");
        Err(match body.error.as_str() {
            "upstream_unavailable" => ExchangeError::UpstreamUnavailable(body.message).into(),
            _ => ClientError::Navigation(body.message),
        })
    }

    async fn refresh(&self, credential: &str) -> Result<SessionResponse, RefreshError> {
        let response = self
            .http
            .post(self.endpoint("/auth/refresh"))
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| RefreshError::UpstreamUnavailable(e.to_string()))?;

        if response.status().is_success() {
            return response
                .json::<SessionResponse>()
                .await
                .map_err(|e| RefreshError::UpstreamUnavailable(e.to_string()));
        }

        let body = error_body(response).await;
        Err(RefreshError::from_code(&body.error, body.message))
    }

    async fn revoke(&self, credential: &str) -> Result<(), RevokeError> {
        let response = self
            .http
            .post(self.endpoint("/auth/revoke"))
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| RevokeError::UpstreamUnavailable(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let body = error_body(response).await;
        Err(RevokeError::from_code(&body.error, body.message))
    }

    async fn identity(&self, credential: &str) -> Result<IdentityClaims, ClientError> {
        let response = self
            .http
            .get(self.endpoint("/api/auth/me"))
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<IdentityClaims>()
                .await
                .map_err(|e| ClientError::Unreachable(e.to_string())),
            StatusCode::UNAUTHORIZED => {
                let body = error_body(response).await;
                let reason = AuthError::from_code(&body.error).unwrap_or(AuthError::InvalidSignature);
                Err(ClientError::Rejected(reason))
            }
            status => Err(ClientError::Unreachable(format!("HTTP {status}"))),
        }
    }
}
