//! JSON API server.
//!
//! Every route under `/api` except registration, login and the health check
//! sits behind [`require_identity`], which verifies the bearer token and puts
//! the caller's [`Identity`] into the request extensions.

pub mod error;

mod accounts;
mod collab;
mod items;
mod projects;
mod uploads;

pub use error::{ApiError, ApiJson, ApiQuery, ApiResult};

use crate::auth::{Argon2PasswordHasher, Identity, PasswordHasher, TokenSigner};
use crate::commands;
use crate::config::ResolvedConfig;
use crate::storage::Storage;
use crate::upload::{LocalObjectStore, ObjectStore, UPLOAD_URL_PREFIX};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Document store; one command holds the lock at a time
    pub storage: Arc<Mutex<Storage>>,
    pub signer: Arc<TokenSigner>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub objects: Arc<dyn ObjectStore>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        storage: Storage,
        signer: TokenSigner,
        hasher: Arc<dyn PasswordHasher>,
        objects: Arc<dyn ObjectStore>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            signer: Arc::new(signer),
            hasher,
            objects,
            max_upload_bytes,
        }
    }
}

/// Verify the bearer token and attach the caller's identity.
async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Not authorized, no token"))?;

    let identity: Identity = state.signer.verify(token)?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Build the full router. Uploaded files under `upload_dir` are served at
/// `/uploads`.
pub fn build_router(state: AppState, upload_dir: &Path) -> Router {
    let protected = Router::new()
        .merge(accounts::protected_routes())
        .nest("/projects", projects::routes())
        .nest("/test-cases", items::test_case_routes())
        .nest("/bugs", items::bug_routes())
        .nest("/tasks", items::task_routes())
        .nest("/test-runs", items::test_run_routes())
        .nest("/comments", collab::comment_routes())
        .nest("/notifications", collab::notification_routes())
        .nest("/notes", collab::note_routes())
        .merge(uploads::routes(state.max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_identity));

    let api = accounts::public_routes().merge(protected);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .nest_service(UPLOAD_URL_PREFIX, ServeDir::new(upload_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Open the store, prepare the upload directory and serve until Ctrl+C.
pub async fn start_server(config: &ResolvedConfig) -> crate::Result<()> {
    let mut storage = Storage::open(&config.data_dir.value)?;
    if config.demo_tokens.value {
        commands::auth::ensure_demo_users(&mut storage)?;
    }

    let upload_dir = config.upload_dir.value.clone();
    let objects = LocalObjectStore::new(&upload_dir)?;
    let signer = TokenSigner::new(
        &config.token_secret.value,
        config.token_ttl_hours.value,
        config.demo_tokens.value,
    );
    let state = AppState::new(
        storage,
        signer,
        Arc::new(Argon2PasswordHasher::default()),
        Arc::new(objects),
        config.max_upload_bytes(),
    );
    let app = build_router(state, &upload_dir);

    let host: std::net::IpAddr = config.host.value.parse().map_err(|e| {
        crate::Error::Config(format!("Invalid host address '{}': {}", config.host.value, e))
    })?;
    let addr = SocketAddr::from((host, config.port.value));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, data_dir = %config.data_dir.value.display(), "qadeck listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
