use crate::{
    orchestrator::{CycleReport, Orchestrator},
    proposal::{Proposal, Protocol},
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::watch};
use tracing::{error, info, warn};

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/", get(|| async { "Nothing on this page." }))
        .route("/health", get(|| async { "OK" }))
        .route("/proposals/fetch-all", get(fetch_all))
        .route("/proposals/fetch/{protocol}", get(fetch_protocol))
        .route("/proposals/expiring", get(expiring))
        .with_state(AppState { orchestrator })
}

/// Serves until `shutdown` turns `true`.
pub async fn serve(
    listener: TcpListener,
    orchestrator: Arc<Orchestrator>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Starting HTTP server");
    }

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
            info!("HTTP server shutting down");
        })
        .await
}

async fn fetch_protocol(
    State(state): State<AppState>,
    Path(protocol): Path<String>,
) -> Result<Json<Vec<Proposal>>, ApiError> {
    let protocol: Protocol = protocol
        .parse()
        .map_err(|e: crate::proposal::UnknownProtocol| {
            ApiError::new(StatusCode::NOT_FOUND, e.to_string())
        })?;

    match state.orchestrator.fetch_protocol(protocol).await {
        Ok(batch) => Ok(Json(batch.proposals)),
        Err(failure) => {
            error!(%protocol, error = %failure, "On-demand fetch failed");
            state.orchestrator.report_failure(protocol, &failure).await;
            Err(ApiError::new(StatusCode::BAD_GATEWAY, failure.to_string()))
        }
    }
}

async fn fetch_all(State(state): State<AppState>) -> Json<CycleReport> {
    Json(state.orchestrator.run_cycle().await)
}

async fn expiring(State(state): State<AppState>) -> Result<Json<Vec<Proposal>>, ApiError> {
    if !state.orchestrator.has_store() {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "no proposal store configured",
        ));
    }

    state
        .orchestrator
        .stored_expiring(Utc::now())
        .await
        .map(Json)
        .map_err(|e| {
            warn!(error = %e, "Reading expiring proposals failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}
