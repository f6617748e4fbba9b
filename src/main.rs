mod auth;
mod error;
mod posts;
mod records;
mod state;
mod store;

use anyhow::Context;
use axum::{Json, Router, routing::get};
use clap::Parser;
use serde_json::json;
use state::{AppState, AuthConfig};
use std::{path::PathBuf, sync::Arc};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{error::AppError, records::RecordClient, store::ContentStore};

#[derive(Parser, Debug)]
#[command(name = "enfoco-server", about = "Landing-page forms and photo feed backend")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// JSON file holding all posts and comments. Created if missing.
    #[arg(long, env = "POSTS_FILE", default_value = "data/posts.json")]
    data_file: PathBuf,

    /// Directory of frontend files served for non-API paths.
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Shared admin password. If unset, admin login is disabled.
    #[arg(long, env = "ADMIN_PASSWORD")]
    admin_password: Option<String>,

    /// Secret used to sign admin session cookies.
    /// If unset, a random secret is generated and sessions end on restart.
    #[arg(long, env = "ADMIN_SECRET")]
    admin_secret: Option<String>,

    /// Mark the admin cookie `Secure` (set when serving over TLS).
    #[arg(long, env = "COOKIE_SECURE")]
    cookie_secure: bool,

    /// Allow anyone, not just the admin, to create posts.
    #[arg(long, env = "OPEN_POSTING")]
    open_posting: bool,

    /// Airtable personal access token.
    #[arg(long, env = "AIRTABLE_TOKEN")]
    airtable_token: Option<String>,

    /// Airtable base id.
    #[arg(long, env = "AIRTABLE_BASE_ID")]
    airtable_base_id: Option<String>,

    /// Airtable API root.
    #[arg(long, env = "AIRTABLE_API_URL", default_value = records::DEFAULT_API_URL)]
    airtable_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (silently ignored if absent).
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "enfoco_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.admin_password.as_deref().is_none_or(str::is_empty) {
        tracing::warn!("ADMIN_PASSWORD not set; admin login is disabled");
    }
    if args.admin_secret.as_deref().is_none_or(str::is_empty) {
        tracing::warn!("ADMIN_SECRET not set; using a random secret, sessions end on restart");
    }
    let auth = AuthConfig::new(args.admin_password, args.admin_secret, args.cookie_secure);

    let store = ContentStore::new(args.data_file);
    store
        .init()
        .await
        .with_context(|| format!("Cannot initialize {}", store.path().display()))?;
    tracing::info!("Posts file: {}", store.path().display());

    let records = RecordClient::new(args.airtable_url, args.airtable_base_id, args.airtable_token)
        .context("Cannot build HTTP client")?;
    if records.is_configured() {
        tracing::info!("Form forwarding enabled");
    } else {
        tracing::warn!("AIRTABLE_TOKEN/AIRTABLE_BASE_ID not set; form submissions will fail");
    }

    tracing::info!(
        "Post creation: {}",
        if args.open_posting { "open to everyone" } else { "admin only" }
    );

    let state = AppState {
        auth: Arc::new(auth),
        store,
        records,
        open_posting: args.open_posting,
    };

    let app = app(state, args.static_dir);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind to {addr}"))?;

    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

fn app(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route(
            "/api/health",
            get(|| async { Json(json!({ "status": "Backend is running!" })) }),
        )
        .merge(auth::router())
        .merge(posts::router())
        .merge(records::router())
        .route(
            "/api/{*rest}",
            axum::routing::any(|| async { AppError::NotFound("Not found".into()) }),
        );

    let router = match static_dir {
        Some(dir) => {
            tracing::info!("Serving static files from {}", dir.display());
            router.fallback_service(ServeDir::new(dir))
        }
        None => router.fallback(|| async { AppError::NotFound("Not found".into()) }),
    };
    let router = router.method_not_allowed_fallback(|| async { AppError::MethodNotAllowed });

    // CatchPanicLayer is outermost so it recovers from panics anywhere in the stack.
    router
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(error::panic_response))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result { tracing::error!("ctrl-c error: {}", e); }
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
    tracing::info!("Shutting down gracefully");
}
