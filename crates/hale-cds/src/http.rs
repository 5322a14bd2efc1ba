//! CDS Hooks HTTP surface
//!
//! - `GET /cds-services` — the discovery document
//! - `POST /cds-services/{service_id}` — invoke one service

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::engine::CdsEngine;
use crate::error::CdsError;
use crate::types::{CdsRequest, CdsResponse, DiscoveryResponse};

/// Build the CDS Hooks router for an engine
pub fn cds_router(engine: Arc<CdsEngine>) -> Router {
    Router::new()
        .route("/cds-services", get(discovery))
        .route("/cds-services/{service_id}", post(invoke))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Serve the CDS Hooks surface on an address
pub async fn serve(engine: Arc<CdsEngine>, addr: &str) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CdsError::service(format!("failed to bind {}: {}", addr, e)))?;
    axum::serve(listener, cds_router(engine))
        .await
        .map_err(|e| CdsError::service(format!("server error: {}", e)))
}

async fn discovery(State(engine): State<Arc<CdsEngine>>) -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        services: engine.discovery(),
    })
}

async fn invoke(
    State(engine): State<Arc<CdsEngine>>,
    Path(service_id): Path<String>,
    Json(request): Json<CdsRequest>,
) -> Result<Json<CdsResponse>, StatusCode> {
    match engine.invoke(&service_id, &request).await {
        Ok(response) => Ok(Json(response)),
        Err(CdsError::UnknownService(_)) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(service = %service_id, error = %e, "CDS invocation failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
