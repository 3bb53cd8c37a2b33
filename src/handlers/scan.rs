use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::models::api::{NotificationRequest, ScanStatusResponse};
use crate::services::scanner::ScanStatus;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/scan/start",
    responses(
        (status = 200, description = "Scanner running; `changed` is false if it already was", body = ScanStatusResponse)
    )
)]
pub async fn start_scan(State(state): State<AppState>) -> Result<Json<ScanStatusResponse>, AppError> {
    let changed = state.scanner.start();
    let status = state.scanner.status().await;
    Ok(Json(ScanStatusResponse { changed, status }))
}

#[utoipa::path(
    post,
    path = "/scan/stop",
    responses(
        (status = 200, description = "Scanner stops after the sweep in progress", body = ScanStatusResponse)
    )
)]
pub async fn stop_scan(State(state): State<AppState>) -> Result<Json<ScanStatusResponse>, AppError> {
    let changed = state.scanner.stop();
    let status = state.scanner.status().await;
    Ok(Json(ScanStatusResponse { changed, status }))
}

#[utoipa::path(
    get,
    path = "/scan/status",
    responses(
        (status = 200, description = "Scanner state and counters", body = ScanStatus)
    )
)]
pub async fn get_scan_status(State(state): State<AppState>) -> Result<Json<ScanStatus>, AppError> {
    Ok(Json(state.scanner.status().await))
}

#[utoipa::path(
    put,
    path = "/notifications",
    request_body = NotificationRequest,
    responses(
        (status = 200, description = "Notification toggle updated", body = ScanStatus)
    )
)]
pub async fn set_notifications(
    State(state): State<AppState>,
    Json(request): Json<NotificationRequest>,
) -> Result<Json<ScanStatus>, AppError> {
    state.scanner.set_notification_enabled(request.enabled);
    Ok(Json(state.scanner.status().await))
}
