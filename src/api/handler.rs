use std::{str::FromStr, sync::Arc, time::Duration};

use alloy::primitives::Address;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::{debug, info};

use crate::{
    api::models::{
        ContractDetailsResponse, ControlResponse, NotFoundResponse, StatusResponse,
    },
    chain::ChainReader,
    error::{AppError, AppResult, ChainError},
    monitor::MonitoringService,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MonitoringService>,
    pub reader: Arc<dyn ChainReader>,
    /// Age of `lastCheck` after which the worker reports unhealthy
    pub stale_after: Duration,
}

/// GET /status and GET /health
///
/// 200 when healthy, 503 otherwise; the body is the same either way.
pub async fn get_status(State(state): State<AppState>) -> (StatusCode, Json<StatusResponse>) {
    let worker = state.service.status().worker_status();
    let response = StatusResponse::from_worker(&worker, Utc::now(), state.stale_after);
    debug!(status = ?response.status, "status requested");

    let code = if response.status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(response))
}

/// POST /monitoring/start
pub async fn start_monitoring(State(state): State<AppState>) -> Json<ControlResponse> {
    info!("Start requested over HTTP");
    let message = if state.service.start().await {
        "Monitoring service started"
    } else {
        "Monitoring service already running"
    };
    Json(ControlResponse {
        success: true,
        message: message.to_string(),
    })
}

/// POST /monitoring/stop
pub async fn stop_monitoring(State(state): State<AppState>) -> Json<ControlResponse> {
    info!("Stop requested over HTTP");
    let message = if state.service.stop().await {
        "Monitoring service stopped"
    } else {
        "Monitoring service was not running"
    };
    Json(ControlResponse {
        success: true,
        message: message.to_string(),
    })
}

/// GET /contracts/:address - full record and derived status of one contract
pub async fn get_contract(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> AppResult<Json<ContractDetailsResponse>> {
    let contract = Address::from_str(address.trim())
        .map_err(|_| AppError::InvalidInput(format!("Invalid contract address: {}", address)))?;

    let details = match state.reader.contract_details(contract).await {
        Ok(details) => details,
        // No inheritance contract (or no code) at that address
        Err(ChainError::CallReverted(_)) | Err(ChainError::Decode { .. }) => {
            return Err(AppError::NotFound(format!("inheritance contract {}", contract)))
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(ContractDetailsResponse::new(details, Utc::now().timestamp())))
}

/// Fallback for unknown paths
pub async fn not_found() -> (StatusCode, Json<NotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            status: "not found",
            available_endpoints: vec!["/status", "/health"],
        }),
    )
}
