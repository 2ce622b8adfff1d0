//! Model comparison endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use bytes::Bytes;
use uuid::Uuid;

use super::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::comparison::ComparisonView;
use crate::models::{
    CreateComparisonRequest, GenerationJob, RecordResultRequest, RunComparisonRequest,
};
use crate::pagination::{calculate_pagination, Page, PageQuery};
use crate::AppState;

/// GET /api/comparisons
pub async fn list_comparisons(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<Page<ComparisonView>>> {
    let Query(query) = query?;
    let total = db::comparisons::count_comparisons(&state.db, user.id()).await?;
    let pagination = calculate_pagination(total, query.page, query.page_size);
    let items = db::comparisons::list_comparisons(
        &state.db,
        user.id(),
        pagination.page_size,
        pagination.offset,
    )
    .await?
    .into_iter()
    .map(ComparisonView::from)
    .collect();
    Ok(Json(Page::new(items, total, pagination)))
}

/// POST /api/comparisons
pub async fn create_comparison(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateComparisonRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ComparisonView>)> {
    let Json(request) = payload?;
    let comparison = db::comparisons::create_comparison(&state.db, user.id(), request).await?;
    Ok((StatusCode::CREATED, Json(comparison.into())))
}

/// GET /api/comparisons/:id
pub async fn get_comparison(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ComparisonView>> {
    let Path(id) = path?;
    let comparison = db::comparisons::get_comparison(&state.db, user.id(), id).await?;
    Ok(Json(comparison.into()))
}

/// DELETE /api/comparisons/:id
pub async fn delete_comparison(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    db::comparisons::delete_comparison(&state.db, user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/comparisons/:id/entries
pub async fn record_comparison_result(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RecordResultRequest>, JsonRejection>,
) -> ApiResult<Json<ComparisonView>> {
    let Path(id) = path?;
    let Json(request) = payload?;
    let comparison = db::comparisons::record_result(&state.db, user.id(), id, request).await?;
    Ok(Json(comparison.into()))
}

/// POST /api/comparisons/:id/run
///
/// Submits one generation per model; an empty body runs with defaults.
pub async fn run_comparison(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Vec<GenerationJob>>)> {
    let Path(id) = path?;
    let request: RunComparisonRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RunComparisonRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))?
    };
    let jobs = state.generations.run_comparison(user.id(), id, request).await?;
    Ok((StatusCode::ACCEPTED, Json(jobs)))
}
