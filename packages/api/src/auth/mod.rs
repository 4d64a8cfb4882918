//! Authentication: Google authorization-code flow and session credential lifecycle.

mod config;
mod exchange;
mod google;
mod login;
mod middleware;
mod pending;
mod provider;
mod refresh;
mod revoke;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    ConfigError, OAuthConfig, SessionSettings, DEFAULT_SESSION_TTL_MINUTES,
    MAX_SESSION_TTL_MINUTES, MIN_SESSION_TTL_MINUTES,
};
pub use exchange::{CallbackExchanger, CompletedLogin};
pub use google::GoogleOAuth;
pub use login::{validate_return_path, LoginError, LoginInitiator};
pub use middleware::{bearer_token, AuthMiddleware, Authenticated, RequestContext, REQUEST_ID_HEADER};
pub use pending::{
    MemoryPendingStore, PendingLogin, PendingLoginStore, PendingStoreError, PgPendingStore,
    PENDING_LOGIN_TTL_MINUTES,
};
pub use provider::{IdentityProvider, ProviderError, ProviderGrant, ProviderIdentity, ProviderTokens};
pub use refresh::SessionRefresher;
pub use revoke::SessionRevoker;
pub use session::{SessionError, SessionSigner};
