//! Web server module with JWT authentication

pub mod auth;
pub mod http;

use anyhow::{Context, Result};
use axum::{
    middleware,
    response::Html,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::identity::{self, IdentityProvider};
use crate::server::auth::{AuthConfig, AuthState};
use crate::session::{SessionController, SessionManager};
use crate::store;

/// How often idle sessions, expired revocations and stale login attempts
/// are dropped
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub auth_state: Arc<AuthState>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: Arc<SessionManager>,
}

impl ServerState {
    /// Assemble state from configuration and the selected backends
    pub async fn from_config(config: &Config) -> Result<Self> {
        let identity = identity::from_config(config)?;
        let store = store::from_config(config).await?;
        let controller = SessionController::new(config.catalog.clone(), config.rewards);
        let sessions = SessionManager::new(controller, store, config.store.retry_policy());

        Ok(Self {
            auth_state: AuthState::new(AuthConfig::from_config(&config.auth)),
            identity,
            sessions: Arc::new(sessions),
        })
    }
}

/// Build the application router
pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Protected routes (require JWT auth)
    let protected = Router::new()
        .route("/api/auth/logout", post(http::logout_handler))
        .route("/api/profile", get(http::profile_handler))
        .route("/api/intents", post(http::intent_handler))
        .route("/api/shop", get(http::shop_handler))
        .route("/api/avatars", get(http::avatars_handler))
        .route("/api/history", get(http::history_handler))
        .route("/api/stats", get(http::stats_handler))
        .route("/api/reminder", get(http::reminder_handler))
        .route_layer(middleware::from_fn_with_state(
            state.auth_state.clone(),
            auth::auth_middleware,
        ));

    let public = Router::new()
        .route("/", get(index_page))
        .route("/api/auth/signup", post(http::signup_handler))
        .route("/api/auth/login", post(http::login_handler))
        .route("/api/auth/refresh", post(http::refresh_handler))
        .route("/api/status", get(http::status_handler));

    Router::new()
        .merge(protected)
        .merge(public)
        .fallback(http::not_found_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server
pub async fn start(
    host: &str,
    port: u16,
    https: bool,
    cert: Option<String>,
    key: Option<String>,
) -> Result<()> {
    let mut config = Config::load()?;
    // Persist the secret so tokens survive a restart
    config.ensure_jwt_secret()?;

    let state = ServerState::from_config(&config).await?;
    let sessions = state.sessions.clone();

    let auth_state = state.auth_state.clone();
    let idle_sessions = state.sessions.clone();
    let max_idle = Duration::from_secs(config.server.session_idle_minutes.saturating_mul(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            auth_state.cleanup();
            idle_sessions.evict_idle(max_idle).await;
        }
    });

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("     LevelUp Life Server Starting");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("✓ Server binding to: {}", addr);
    println!("✓ Identity provider: {}", state.identity.name());
    println!("✓ Profile store: {}", state.sessions.store_name());
    if https {
        println!("✓ HTTPS enabled");
    } else {
        println!("⚠ HTTPS disabled");
    }
    println!();
    println!("🚀 Listening on http{}://{}", if https { "s" } else { "" }, addr);
    println!();

    let app = router(state);

    let serve = async move {
        if https {
            let (Some(cert_path), Some(key_path)) = (cert, key) else {
                anyhow::bail!("--https needs both --cert and --key");
            };
            let cert_data = tokio::fs::read(&cert_path)
                .await
                .context("Failed to read certificate file")?;
            let key_data = tokio::fs::read(&key_path)
                .await
                .context("Failed to read key file")?;

            let tls = axum_server::tls_rustls::RustlsConfig::from_pem(cert_data, key_data).await?;
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await?;
        } else {
            axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
        }
        Ok::<(), anyhow::Error>(())
    };

    tokio::select! {
        result = serve => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    let failed = sessions.flush_all().await;
    if failed > 0 {
        warn!("{} profile(s) could not be saved before shutdown", failed);
    }

    Ok(())
}

/// Index page
async fn index_page() -> Html<&'static str> {
    Html(r#"<!DOCTYPE html>
<html>
<head>
    <title>LevelUp Life</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 720px;
            margin: 40px auto;
            padding: 0 20px;
            color: #222;
        }
        code { background: #f2f2f2; padding: 2px 5px; border-radius: 3px; }
        li { margin: 6px 0; }
    </style>
</head>
<body>
    <h1>🌟 LevelUp Life</h1>
    <p>Turn habits and goals into XP, levels, streaks and coins.</p>
    <h2>API</h2>
    <ul>
        <li><code>POST /api/auth/signup</code> and <code>POST /api/auth/login</code></li>
        <li><code>GET /api/profile</code></li>
        <li><code>POST /api/intents</code> with <code>add_task</code>, <code>complete_task</code>, <code>purchase_avatar</code> or <code>select_avatar</code></li>
        <li><code>GET /api/shop</code>, <code>GET /api/avatars</code></li>
        <li><code>GET /api/history</code>, <code>GET /api/stats</code>, <code>GET /api/reminder</code></li>
    </ul>
</body>
</html>"#)
}
