use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use validator::Validate;

use crate::errors::AppError;
use crate::models::api::{ResultPath, SortRequest, SortResponse};
use crate::models::match_result::{MatchResult, ResultsSnapshot, ScanEvent, SortColumn};
use crate::models::timeframe::Timeframe;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/results",
    responses(
        (status = 200, description = "All matches, sorted by the current sort column", body = ResultsSnapshot)
    )
)]
pub async fn get_results(State(state): State<AppState>) -> Result<Json<ResultsSnapshot>, AppError> {
    Ok(Json(state.scanner.snapshot().await))
}

#[utoipa::path(
    get,
    path = "/results/{symbol}/{timeframe}",
    params(ResultPath),
    responses(
        (status = 200, description = "Match for one symbol and timeframe", body = MatchResult),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "No match recorded", body = crate::errors::ErrorResponse)
    )
)]
pub async fn get_result(
    State(state): State<AppState>,
    Path(path): Path<ResultPath>,
) -> Result<Json<MatchResult>, AppError> {
    path.validate()
        .map_err(|err| AppError::Validation(err.to_string()))?;
    let timeframe: Timeframe = path.timeframe.parse().map_err(AppError::Validation)?;

    state
        .scanner
        .result(&path.symbol.to_uppercase(), timeframe)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no match for {}-{}", path.symbol, timeframe)))
}

#[utoipa::path(
    post,
    path = "/results/sort",
    request_body = SortRequest,
    responses(
        (status = 200, description = "New sort column and direction", body = SortResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    )
)]
pub async fn sort_results(
    State(state): State<AppState>,
    Json(request): Json<SortRequest>,
) -> Result<Json<SortResponse>, AppError> {
    request
        .validate()
        .map_err(|err| AppError::Validation(err.to_string()))?;
    let column: SortColumn = request.column.parse().map_err(AppError::Validation)?;

    let sort = state.scanner.set_sort_column(column).await;
    Ok(Json(SortResponse { sort }))
}

#[utoipa::path(
    get,
    path = "/results/stream",
    responses(
        (status = 200, description = "SSE stream of result snapshots and match alerts", content_type = "text/event-stream")
    )
)]
pub async fn get_results_stream(
    State(state): State<AppState>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let rx = state.presenter.subscribe();
    let initial = scan_event(&ScanEvent::Snapshot(state.scanner.snapshot().await))?;
    let initial_stream = tokio_stream::iter(vec![Ok(initial)]);

    let broadcast_stream = BroadcastStream::new(rx).filter_map(|message| match message {
        Ok(event) => match scan_event(&event) {
            Ok(event) => Some(Ok(event)),
            Err(error) => {
                tracing::error!("results stream error: {}", error);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!("results stream lagged, skipped {} events", skipped);
            None
        }
    });

    let stream = initial_stream.chain(broadcast_stream);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn scan_event(event: &ScanEvent) -> Result<Event, AppError> {
    let (name, id, data) = match event {
        ScanEvent::Snapshot(snapshot) => (
            "snapshot",
            snapshot.as_of_ms.to_string(),
            serde_json::to_string(snapshot),
        ),
        ScanEvent::Match(alert) => (
            "match",
            alert.result.key(),
            serde_json::to_string(alert),
        ),
    };
    let data = data.map_err(|err| AppError::Internal(err.to_string()))?;

    Ok(Event::default().event(name).id(id).data(data))
}
