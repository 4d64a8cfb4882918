//! # Database module: PostgreSQL connection pool and migrations
//!
//! PostgreSQL is optional for the backend: it only backs the pending-login store when
//! `DATABASE_URL` is set, so that several backend instances can share anti-forgery
//! state. Sessions themselves are stateless signed credentials and never touch it.
//!
//! ## Design
//!
//! The pool is a **lazy, process-wide singleton** backed by a [`tokio::sync::OnceCell`].
//! The first call to [`get_pool`] reads `DATABASE_URL` from the environment (via `dotenvy`),
//! opens a connection pool with up to 5 connections, and caches the result for all
//! subsequent callers.
//!
//! ## Re-exports
//!
//! - [`get_pool`]: returns `&'static PgPool`, initialising it on first use.
//! - [`database_url`]: `DATABASE_URL` if it is set and non-empty.
//! - [`run_migrations`]: applies `packages/api/migrations`.

mod pool;

pub use pool::{database_url, get_pool, run_migrations, DbError};
