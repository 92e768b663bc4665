//! HTTP surface: upload endpoint plus static serving of converted media.
//!
//! ```text
//! POST /upload                               multipart field "file" → {html, folder} | {error}
//! GET  <public_prefix>/output_images/<id>/…  workspace media
//! GET  /health
//! ```
//!
//! Expected failures (bad document, missing tool) come back as `200` with an
//! `{error}` body, matching the pipeline's contract; only a malformed or
//! empty multipart request is a `400`. Each request's pipeline runs on its
//! own server task and awaits its subprocesses, so a slow pandoc run never
//! blocks other uploads.

use crate::config::ConversionConfig;
use crate::convert::handle_upload;
use crate::output::ConversionResult;
use crate::retention::sweep_workspaces;
use crate::tools::check_tools;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Multipart field carrying the document.
pub const UPLOAD_FIELD: &str = "file";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ConversionConfig>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Build the application router.
pub fn router(config: Arc<ConversionConfig>) -> Router {
    let media = ServeDir::new(config.workspaces_root());
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(upload))
        .nest_service(&config.media_route(), media)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { config })
}

/// Bind `addr` and serve until Ctrl+C / SIGTERM.
pub async fn serve(config: ConversionConfig, addr: SocketAddr) -> std::io::Result<()> {
    tokio::fs::create_dir_all(config.workspaces_root()).await?;
    for status in check_tools(&config).await {
        match status.version {
            Some(ref v) => tracing::info!("{} '{}': {}", status.role, status.program, v),
            None => tracing::warn!(
                "{} '{}' is not usable; uploads will fail until it is installed",
                status.role,
                status.program
            ),
        }
    }

    let config = Arc::new(config);
    if let Some(secs) = config.workspace_max_age_secs {
        spawn_retention_task(Arc::clone(&config), Duration::from_secs(secs));
    }

    let app = router(Arc::clone(&config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "docx2html listening on {} (media at {})",
        listener.local_addr()?,
        config.media_route()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Accept one document and return the converted HTML.
async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read multipart field: {}", e);
                return bad_request(format!("Failed to read upload: {e}"));
            }
        };

        if field.name() != Some(UPLOAD_FIELD) {
            tracing::debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }

        let filename = field.file_name().unwrap_or("upload.docx").to_string();
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Failed to read file data: {}", e);
                return bad_request(format!("Failed to read file data: {e}"));
            }
        };

        let result = handle_upload(&filename, &data, &state.config).await;
        return (StatusCode::OK, Json(result)).into_response();
    }

    tracing::warn!("No file field found in multipart upload");
    bad_request("No file uploaded".to_string())
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ConversionResult::Failed { error })).into_response()
}

fn spawn_retention_task(config: Arc<ConversionConfig>, max_age: Duration) {
    let period = max_age.clamp(Duration::from_secs(60), Duration::from_secs(3600));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_workspaces(&config.workspaces_root(), max_age).await {
                tracing::warn!("Retention sweep failed: {}", e);
            }
        }
    });
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
