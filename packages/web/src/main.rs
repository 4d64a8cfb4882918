//! Taskboard sign-in backend.
//!
//! Configuration comes from the environment (and `.env`):
//!
//! | Variable | Default |
//! |----------|---------|
//! | `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET` | required |
//! | `AUTH_REDIRECT_URI` | `http://localhost:8080/auth/callback` |
//! | `SESSION_SECRET` | required, 64 hex characters |
//! | `SESSION_TTL_MINUTES` | `60` |
//! | `APP_URL` | `http://localhost:8080` |
//! | `BIND_ADDR` | `127.0.0.1:8080` |
//! | `DATABASE_URL` | unset: pending logins are kept in memory |
//! | `RUST_LOG` | `info,web=debug,api=debug` |

use std::sync::Arc;

use anyhow::Context;
use api::auth::{
    GoogleOAuth, MemoryPendingStore, OAuthConfig, PendingLoginStore, PgPendingStore,
    SessionSettings, REQUEST_ID_HEADER,
};
use api::routes::{router, AppState};
use api::SystemClock;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let oauth = OAuthConfig::google().context("Google OAuth configuration")?;
    let settings = SessionSettings::from_env().context("session configuration")?;
    let provider = GoogleOAuth::new(oauth).context("Google OAuth client")?;
    let pending = pending_store().await?;

    let cors = cors_layer(&settings)?;
    let state = AppState::new(Arc::new(provider), pending, settings, Arc::new(SystemClock));
    let app = build_app(state, cors);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,web=debug,api=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// PostgreSQL when `DATABASE_URL` is set, so several instances share pending logins.
async fn pending_store() -> anyhow::Result<Arc<dyn PendingLoginStore>> {
    if api::db::database_url().is_none() {
        info!("DATABASE_URL not set, keeping pending logins in memory");
        return Ok(Arc::new(MemoryPendingStore::new()));
    }

    let pool = api::db::get_pool()
        .await
        .context("connecting to database")?;
    api::db::run_migrations(pool)
        .await
        .context("running migrations")?;
    info!("Pending logins stored in PostgreSQL");
    Ok(Arc::new(PgPendingStore::new(pool.clone())))
}

/// The front end calls `/auth/*` from `APP_URL`, which may be another origin.
fn cors_layer(settings: &SessionSettings) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(&settings.app_url.origin().ascii_serialization())
        .context("APP_URL origin")?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)]))
}

fn build_app(state: AppState, cors: CorsLayer) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router(state)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        () = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::crypto::SessionKeys;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        let oauth = OAuthConfig::google_with(
            "client-id".into(),
            "client-secret".into(),
            "http://localhost:8080/auth/callback",
        )
        .unwrap();
        let settings =
            SessionSettings::new(SessionKeys::generate().unwrap(), 60, "https://tasks.example")
                .unwrap();
        let cors = cors_layer(&settings).unwrap();
        let state = AppState::new(
            Arc::new(GoogleOAuth::new(oauth).unwrap()),
            Arc::new(MemoryPendingStore::new()),
            settings,
            Arc::new(SystemClock),
        );
        build_app(state, cors)
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/auth/me")
                    .header(REQUEST_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
    }

    #[tokio::test]
    async fn test_cors_allows_app_origin() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/auth/refresh")
                    .header(header::ORIGIN, "https://tasks.example")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://tasks.example"
        );
    }
}
