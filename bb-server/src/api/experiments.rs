//! Experiment endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use super::CurrentUser;
use crate::db;
use crate::error::ApiResult;
use crate::models::{
    AddExperimentAssetRequest, CreateExperimentRequest, Experiment, ExperimentDetail,
    UpdateExperimentRequest,
};
use crate::pagination::{calculate_pagination, Page, PageQuery};
use crate::AppState;

/// GET /api/experiments
pub async fn list_experiments(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<Page<Experiment>>> {
    let Query(query) = query?;
    let total = db::experiments::count_experiments(&state.db, user.id()).await?;
    let pagination = calculate_pagination(total, query.page, query.page_size);
    let items = db::experiments::list_experiments(
        &state.db,
        user.id(),
        pagination.page_size,
        pagination.offset,
    )
    .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

/// POST /api/experiments
pub async fn create_experiment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateExperimentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Experiment>)> {
    let Json(request) = payload?;
    let experiment = db::experiments::create_experiment(&state.db, user.id(), request).await?;
    Ok((StatusCode::CREATED, Json(experiment)))
}

/// GET /api/experiments/:id (with linked assets)
pub async fn get_experiment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ExperimentDetail>> {
    let Path(id) = path?;
    Ok(Json(db::experiments::get_experiment_detail(&state.db, user.id(), id).await?))
}

/// PATCH /api/experiments/:id
pub async fn update_experiment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateExperimentRequest>, JsonRejection>,
) -> ApiResult<Json<Experiment>> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    Ok(Json(db::experiments::update_experiment(&state.db, user.id(), id, patch).await?))
}

/// DELETE /api/experiments/:id
pub async fn delete_experiment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    db::experiments::delete_experiment(&state.db, user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/experiments/:id/assets
pub async fn add_experiment_asset(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AddExperimentAssetRequest>, JsonRejection>,
) -> ApiResult<Json<ExperimentDetail>> {
    let Path(id) = path?;
    let Json(request) = payload?;
    db::experiments::add_experiment_asset(&state.db, user.id(), id, request.asset_id, request.note)
        .await?;
    Ok(Json(db::experiments::get_experiment_detail(&state.db, user.id(), id).await?))
}

/// DELETE /api/experiments/:id/assets/:asset_id
pub async fn remove_experiment_asset(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path((id, asset_id)) = path?;
    db::experiments::remove_experiment_asset(&state.db, user.id(), id, asset_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
