//! OAuth and session configuration from environment variables.

use chrono::Duration;
use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};
use url::Url;

use crate::crypto::SessionKeys;

pub const MIN_SESSION_TTL_MINUTES: i64 = 5;
pub const MAX_SESSION_TTL_MINUTES: i64 = 24 * 60;
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl ToString) -> Self {
        Self::Invalid {
            name,
            reason: reason.to_string(),
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// OAuth provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub redirect_url: RedirectUrl,
    pub userinfo_url: Url,
    pub revocation_url: Url,
}

impl OAuthConfig {
    /// Create Google OAuth config from environment variables.
    pub fn google() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let client_id = required("GOOGLE_CLIENT_ID")?;
        let client_secret = required("GOOGLE_CLIENT_SECRET")?;
        let redirect_uri = optional(
            "AUTH_REDIRECT_URI",
            "http://localhost:8080/auth/callback",
        );

        Self::google_with(client_id, client_secret, &redirect_uri)
    }

    /// Google endpoints with explicit client credentials.
    pub fn google_with(
        client_id: String,
        client_secret: String,
        redirect_uri: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            auth_url: AuthUrl::new(GOOGLE_AUTH_URL.to_string())
                .map_err(|e| ConfigError::invalid("auth url", e))?,
            token_url: TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
                .map_err(|e| ConfigError::invalid("token url", e))?,
            redirect_url: RedirectUrl::new(redirect_uri.to_string())
                .map_err(|e| ConfigError::invalid("AUTH_REDIRECT_URI", e))?,
            userinfo_url: Url::parse(GOOGLE_USERINFO_URL)
                .map_err(|e| ConfigError::invalid("userinfo url", e))?,
            revocation_url: Url::parse(GOOGLE_REVOKE_URL)
                .map_err(|e| ConfigError::invalid("revocation url", e))?,
        })
    }

    /// Point every provider endpoint at `base` (a mock server, a proxy).
    pub fn with_provider_base(mut self, base: &str) -> Result<Self, ConfigError> {
        let base = base.trim_end_matches('/');
        self.auth_url = AuthUrl::new(format!("{base}/auth"))
            .map_err(|e| ConfigError::invalid("auth url", e))?;
        self.token_url = TokenUrl::new(format!("{base}/token"))
            .map_err(|e| ConfigError::invalid("token url", e))?;
        self.userinfo_url = Url::parse(&format!("{base}/userinfo"))
            .map_err(|e| ConfigError::invalid("userinfo url", e))?;
        self.revocation_url = Url::parse(&format!("{base}/revoke"))
            .map_err(|e| ConfigError::invalid("revocation url", e))?;
        Ok(self)
    }
}

/// How sessions are signed and how long they last.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub keys: SessionKeys,
    pub ttl: Duration,
    /// Where the browser app lives; callback redirects are resolved against it.
    pub app_url: Url,
}

impl SessionSettings {
    /// Read `SESSION_SECRET`, `SESSION_TTL_MINUTES` and `APP_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let secret = required("SESSION_SECRET")?;
        let keys =
            SessionKeys::from_hex(&secret).map_err(|e| ConfigError::invalid("SESSION_SECRET", e))?;
        let ttl_minutes = optional(
            "SESSION_TTL_MINUTES",
            &DEFAULT_SESSION_TTL_MINUTES.to_string(),
        )
        .trim()
        .parse::<i64>()
        .map_err(|e| ConfigError::invalid("SESSION_TTL_MINUTES", e))?;
        let app_url = optional("APP_URL", "http://localhost:8080");

        Self::new(keys, ttl_minutes, &app_url)
    }

    pub fn new(keys: SessionKeys, ttl_minutes: i64, app_url: &str) -> Result<Self, ConfigError> {
        if !(MIN_SESSION_TTL_MINUTES..=MAX_SESSION_TTL_MINUTES).contains(&ttl_minutes) {
            return Err(ConfigError::invalid(
                "SESSION_TTL_MINUTES",
                format!(
                    "{ttl_minutes} is outside {MIN_SESSION_TTL_MINUTES}..={MAX_SESSION_TTL_MINUTES}"
                ),
            ));
        }
        let app_url = Url::parse(app_url).map_err(|e| ConfigError::invalid("APP_URL", e))?;

        Ok(Self {
            keys,
            ttl: Duration::minutes(ttl_minutes),
            app_url,
        })
    }
}
