//! # API crate: session lifecycle shared between the Taskboard backend and its clients
//!
//! This crate is compiled twice. Without features it is the thin, WASM-friendly set of
//! wire types every client needs to understand a session: the credential format, the
//! identity claims it carries and the error taxonomy both sides agree on. With the
//! `server` feature it additionally contains everything the backend needs to run the
//! Google authorization-code flow and guard protected routes.
//!
//! ## Modules
//!
//! | Module | Feature gate | Purpose |
//! |--------|-------------|---------|
//! | [`clock`] | none | Injected time source (`Clock`) with system and manual implementations |
//! | [`credential`] | none | `SessionCredential`: wire encoding, decoding and the validity window invariant |
//! | [`error`] | none | `ExchangeError`, `AuthError`, `RefreshError`, `RevokeError` and their wire codes |
//! | [`models`] | none | `IdentityClaims` and the JSON bodies exchanged with the backend |
//! | [`auth`] | `server` | Provider client, anti-forgery store, code exchange, middleware, refresh, revoke |
//! | [`crypto`] | `server` | Session key material: HMAC signing and AES-GCM sealing of refresh tokens |
//! | [`db`] | `server` | PostgreSQL pool (lazy `OnceCell` singleton) and migrations |
//! | [`routes`] | `server` | The axum router exposing `/auth/*` and `/api/auth/me` |

pub mod clock;
pub mod credential;
pub mod error;
pub mod models;

#[cfg(feature = "server")]
pub mod auth;
#[cfg(feature = "server")]
pub mod crypto;
#[cfg(feature = "server")]
pub mod db;
#[cfg(feature = "server")]
pub mod routes;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{CredentialError, SessionCredential};
pub use error::{AuthError, ErrorBody, ExchangeError, RefreshError, RevokeError};
pub use models::{IdentityClaims, LoginStart, SessionResponse};
