// ABOUTME: HTTP server assembly: merges every route module and applies the shared layers
// ABOUTME: Also owns the background sweep of expired OAuth states and graceful shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Recast Contributors

//! # Server
//!
//! [`build_router`] is what integration tests drive with `tower::ServiceExt::oneshot`;
//! [`run`] binds it to a TCP port for the binary.

use std::future::pending;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::middleware::from_fn;
use axum::Router;
use chrono::Utc;
use http::{Request, StatusCode};
use recast_core::constants::twitter::OAUTH_STATE_SWEEP_SECS;
use recast_core::errors::{AppError, AppResult};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::field::Empty;
use tracing::{info, info_span, warn, Level};

use crate::database::{Database, OAuthStatesManager};
use crate::middleware::{request_id_middleware, setup_cors};
use crate::resources::ServerResources;
use crate::routes::{
    AdminRoutes, AiRoutes, AuthRoutes, ContentRoutes, FolderRoutes, HealthRoutes, PaymentRoutes,
    PersonaRoutes, SettingsRoutes, SnippetRoutes, TemplateRoutes, TwitterRoutes, UploadRoutes,
};

/// Upper bound on a single request, long enough for AI calls and chain verification
const REQUEST_TIMEOUT_SECS: u64 = 180;

/// Build the complete application router
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let cors = setup_cors(&resources.config.security.cors_origins);

    Router::new()
        .merge(HealthRoutes::routes(Arc::clone(&resources)))
        .merge(AuthRoutes::routes(Arc::clone(&resources)))
        .merge(SettingsRoutes::routes(Arc::clone(&resources)))
        .merge(FolderRoutes::routes(Arc::clone(&resources)))
        .merge(PersonaRoutes::routes(Arc::clone(&resources)))
        .merge(ContentRoutes::routes(Arc::clone(&resources)))
        .merge(SnippetRoutes::routes(Arc::clone(&resources)))
        .merge(AiRoutes::routes(Arc::clone(&resources)))
        .merge(TemplateRoutes::routes(Arc::clone(&resources)))
        .merge(TwitterRoutes::routes(Arc::clone(&resources)))
        .merge(PaymentRoutes::routes(Arc::clone(&resources)))
        .merge(UploadRoutes::routes(Arc::clone(&resources)))
        .merge(AdminRoutes::routes(resources))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = Empty,
                        user_id = Empty,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(request_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(cors)
}

/// Abandon requests that run past `timeout` with `408 Request Timeout`
fn request_timeout(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Periodically delete expired Twitter OAuth states
pub fn spawn_state_sweeper(database: Database, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let states = OAuthStatesManager::new(database.pool().clone());
        let mut ticker = interval(period);
        // The first tick completes immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match states.delete_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(deleted) => info!(deleted, "Swept expired OAuth states"),
                Err(e) => warn!("OAuth state sweep failed: {}", e.message),
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

/// Serve the API on `port` until Ctrl-C
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails
pub async fn run(resources: Arc<ServerResources>, port: u16) -> AppResult<()> {
    let sweeper = spawn_state_sweeper(
        resources.database.clone(),
        Duration::from_secs(OAUTH_STATE_SWEEP_SECS),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::config(format!("Failed to bind {addr}: {e}")))?;
    info!("HTTP server listening on http://{addr}");

    let served = axum::serve(listener, build_router(resources))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("HTTP server error: {e}")));

    sweeper.abort();
    served
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use tokio::time::sleep;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_requests_time_out_with_408() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .route("/fast", get(|| async { "ok" }))
            .layer(request_timeout(Duration::from_secs(1)));

        let slow = Request::builder().uri("/slow").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(slow).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let fast = Request::builder().uri("/fast").body(Body::empty()).unwrap();
        let response = app.oneshot(fast).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
