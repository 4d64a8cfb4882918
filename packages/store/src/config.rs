//! # Client configuration: `taskboard.toml`
//!
//! Read once when a client starts; the values are fixed for the life of the process.
//!
//! ## Structure
//!
//! ```toml
//! [backend]
//! url = "https://tasks.example.com"   # where /auth/* and /api/* live
//!
//! [session]
//! refresh_leeway_secs = 60    # refresh this long before the credential expires
//! login_timeout_secs = 600    # give up on a login that never came back
//! ```
//!
//! ## Types
//!
//! | Struct | Purpose |
//! |--------|---------|
//! | [`ClientConfig`] | Top-level config. TOML (de)serialisation, env override, canonical filename. |
//! | [`BackendConfig`] | Backend section, the base URL. Default **`http://localhost:8080`**. |
//! | [`SessionConfig`] | Session timing. Defaults **60 s** leeway, **600 s** login timeout. |
//!
//! All structs derive `Default` so that a missing or empty config file is equivalent
//! to the default configuration. `TASKBOARD_BACKEND_URL` overrides `backend.url`.

use serde::{Deserialize, Serialize};

pub const BACKEND_URL_ENV: &str = "TASKBOARD_BACKEND_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid taskboard.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("backend.url must be an http(s) URL, got {0:?}")]
    BackendUrl(String),
}

/// Top-level configuration stored in `taskboard.toml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
}

fn default_backend_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Refresh when the credential expires within this many seconds.
    #[serde(default = "default_refresh_leeway")]
    pub refresh_leeway_secs: u64,
    /// An unfinished login older than this is abandoned.
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,
}

fn default_refresh_leeway() -> u64 {
    60
}

fn default_login_timeout() -> u64 {
    600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_leeway_secs: default_refresh_leeway(),
            login_timeout_secs: default_login_timeout(),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `url` with default session timing.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig { url: url.into() },
            session: SessionConfig::default(),
        }
    }

    /// The well-known filename for the config file.
    pub fn filename() -> &'static str {
        "taskboard.toml"
    }

    /// Parse from TOML string and check the backend URL.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validated()
    }

    /// Serialize to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Apply `TASKBOARD_BACKEND_URL` if it is set.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            match std::env::var(BACKEND_URL_ENV) {
                Ok(url) if !url.trim().is_empty() => self.with_backend_url(url),
                _ => Ok(self),
            }
        }
        #[cfg(target_arch = "wasm32")]
        {
            Ok(self)
        }
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        self.backend.url = url.into();
        self.validated()
    }

    /// Backend URL without a trailing slash, ready for `format!("{base}/auth/...")`.
    pub fn backend_base(&self) -> &str {
        self.backend.url.trim_end_matches('/')
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let url = self.backend.url.trim();
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(self)
        } else {
            Err(ConfigError::BackendUrl(self.backend.url))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = ClientConfig::from_toml("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.session.refresh_leeway_secs, 60);
        assert_eq!(config.session.login_timeout_secs, 600);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = ClientConfig::from_toml(
            r#"
            [backend]
            url = "https://tasks.example.com/"

            [session]
            refresh_leeway_secs = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.backend_base(), "https://tasks.example.com");
        assert_eq!(config.session.refresh_leeway_secs, 120);
        assert_eq!(config.session.login_timeout_secs, 600);

        let back = ClientConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_backend_url_must_be_http() {
        assert!(matches!(
            ClientConfig::from_toml("[backend]\nurl = \"ftp://nope\""),
            Err(ConfigError::BackendUrl(_))
        ));
        assert!(ClientConfig::default()
            .with_backend_url("tasks.example.com")
            .is_err());
    }
}
