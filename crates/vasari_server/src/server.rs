//! HTTP server assembly and lifecycle.

use crate::{MediaFileResolver, resolve_media};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Router, middleware};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};
use vasari_error::{ServerError, ServerErrorKind};

/// Build the application router.
///
/// Media file requests are answered by the resolver; `/health` reports
/// liveness; everything else is a 404.
pub fn router(resolver: Arc<MediaFileResolver>) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(resolver, resolve_media))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Bind a listener on `address`.
///
/// # Errors
///
/// Returns `Bind` if the address is unavailable.
#[instrument]
pub async fn bind(address: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(address)
        .await
        .map_err(|e| ServerError::new(ServerErrorKind::Bind(format!("{}: {}", address, e))))
}

/// Serve `resolver` on `listener` until `shutdown` completes.
///
/// In-flight backend fetches are cancelled once shutdown begins.
///
/// # Errors
///
/// Returns `Serve` if the server loop fails.
#[instrument(skip_all)]
pub async fn serve(
    listener: TcpListener,
    resolver: Arc<MediaFileResolver>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let address = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(address = %address, "Media server listening");

    let token = resolver.shutdown_token().clone();
    let app = router(resolver);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested, cancelling backend fetches");
            token.cancel();
        })
        .await
        .map_err(|e| ServerError::new(ServerErrorKind::Serve(e.to_string())))
}
