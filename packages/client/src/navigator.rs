//! Full-page redirects to the identity provider.

use tracing::error;

use crate::error::ClientError;

/// Sends the user somewhere else. Injected so tests can record instead of leaving.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str) -> Result<(), ClientError>;
}

/// Replaces the current page (`window.location.href = url`).
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNavigator;

#[cfg(target_arch = "wasm32")]
impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &str) -> Result<(), ClientError> {
        let window = web_sys::window()
            .ok_or_else(|| ClientError::Navigation("no window".to_string()))?;
        window.location().set_href(url).map_err(|e| {
            error!("Failed to redirect: {:?}", e);
            ClientError::Navigation(format!("{e:?}"))
        })
    }
}

/// Opens the URL in the system browser (desktop clients).
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

#[cfg(not(target_arch = "wasm32"))]
impl Navigator for SystemBrowser {
    fn navigate(&self, url: &str) -> Result<(), ClientError> {
        open::that(url).map_err(|e| {
            error!("Failed to open browser: {}", e);
            ClientError::Navigation(e.to_string())
        })
    }
}
