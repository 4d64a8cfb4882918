//! # Client crate: the Taskboard session as seen from the browser or desktop app
//!
//! Everything a front end needs to sign a user in with Google, keep the session
//! alive, and sign out. The UI only talks to an [`AuthStore`]: it reads or subscribes
//! to the [`AuthState`], calls `authorize()` before each protected request, and
//! forwards backend rejections to `handle_rejection()`.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`state`] | `AuthState`, `AuthEvent` and the transition table |
//! | [`auth_store`] | `AuthStore`: construction, `authorize`, single-flight `refresh` |
//! | `login` | `begin_login`, `resume_login`, `complete_login`, `cancel_login`, timeouts |
//! | `revoke` | `revoke`: sign-out that always clears local state |
//! | [`bootstrap`] | `Restore` and `StoreBootstrapper`: restoring the persisted session |
//! | [`backend`] | `AuthBackend` and its `reqwest` implementation |
//! | [`callback`] | Reading the login result off the redirect URL |
//! | [`navigator`] | Full-page redirect (browser) or system browser (desktop) |
//! | [`preferences`] | `TimeZoneSource` for rendering session times |
//! | [`error`] | `ClientError` and user-facing messages |
//!
//! ## Starting up
//!
//! ```ignore
//! let config = ClientConfig::default().with_env_overrides()?;
//! let auth = AuthStore::builder(FileStore::in_data_dir(), Arc::new(HttpBackend::from_config(&config)))
//!     .session(config.session.clone())
//!     .start()
//!     .await;
//! ```

pub mod auth_store;
pub mod backend;
pub mod bootstrap;
pub mod callback;
pub mod error;
pub mod navigator;
pub mod preferences;
pub mod state;

mod login;
mod revoke;

#[cfg(test)]
mod testing;

pub use auth_store::{AuthStore, AuthStoreBuilder};
pub use backend::{AuthBackend, HttpBackend};
pub use bootstrap::{Restore, StoreBootstrapper};
pub use callback::CallbackOutcome;
pub use error::ClientError;
pub use navigator::Navigator;
#[cfg(target_arch = "wasm32")]
pub use navigator::BrowserNavigator;
#[cfg(not(target_arch = "wasm32"))]
pub use navigator::SystemBrowser;
pub use preferences::{FixedTimeZone, TimeZoneSource};
#[cfg(target_arch = "wasm32")]
pub use preferences::BrowserTimeZone;
pub use state::{AttemptId, AuthEvent, AuthState};
