//! Reading the result of a login from the page the backend redirected to.
//!
//! The backend finishes `/auth/callback` with one of two redirects:
//!
//! - success: `{APP_URL}{return_to}#credential=<credential>`
//! - failure: `{APP_URL}/login?error=<code>`
//!
//! The credential travels in the fragment so it never reaches a server log.

use api::ExchangeError;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Credential { credential: String, return_to: String },
    Failed(ExchangeError),
    /// An ordinary page load.
    NotACallback,
}

impl CallbackOutcome {
    pub fn from_url(location: &str) -> Self {
        let Ok(url) = Url::parse(location) else {
            return Self::NotACallback;
        };

        if let Some(credential) = url.fragment().and_then(|f| f.strip_prefix("credential=")) {
            if !credential.is_empty() {
                let mut return_to = url.path().to_string();
                if let Some(query) = url.query() {
                    return_to.push('?');
                    return_to.push_str(query);
                }
                return Self::Credential {
                    credential: credential.to_string(),
                    return_to,
                };
            }
        }

        if url.path() == "/login" {
            if let Some((_, code)) = url.query_pairs().find(|(k, _)| k == "error") {
                return Self::Failed(ExchangeError::from_code(&code, code.to_string()));
            }
        }

        Self::NotACallback
    }

    /// The current page, in a browser.
    #[cfg(target_arch = "wasm32")]
    pub fn from_window() -> Self {
        web_sys::window()
            .and_then(|w| w.location().href().ok())
            .map(|href| Self::from_url(&href))
            .unwrap_or(Self::NotACallback)
    }
}
