use axum::{
    routing::{get, post, put},
    Router,
};
use utoipa::OpenApi;

use crate::handlers::{health, results, scan};
use crate::models::api::{
    HealthResponse, NotificationRequest, ScanStatusResponse, SortRequest, SortResponse,
};
use crate::models::match_result::{
    MatchAlert, MatchResult, ResultsSnapshot, SortColumn, SortDirection, SortSpec,
};
use crate::models::timeframe::Timeframe;
use crate::services::scanner::{ScanState, ScanStatus};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        scan::start_scan,
        scan::stop_scan,
        scan::get_scan_status,
        scan::set_notifications,
        results::get_results,
        results::get_result,
        results::sort_results,
        results::get_results_stream
    ),
    components(schemas(
        HealthResponse,
        ScanStatusResponse,
        ScanStatus,
        ScanState,
        NotificationRequest,
        SortRequest,
        SortResponse,
        SortSpec,
        SortColumn,
        SortDirection,
        ResultsSnapshot,
        MatchResult,
        MatchAlert,
        Timeframe,
        crate::errors::ErrorResponse
    ))
)]
pub struct ApiDoc;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/scan/start", post(scan::start_scan))
        .route("/scan/stop", post(scan::stop_scan))
        .route("/scan/status", get(scan::get_scan_status))
        .route("/notifications", put(scan::set_notifications))
        .route("/results", get(results::get_results))
        .route("/results/sort", post(results::sort_results))
        .route("/results/stream", get(results::get_results_stream))
        .route("/results/{symbol}/{timeframe}", get(results::get_result))
        .with_state(state)
}
