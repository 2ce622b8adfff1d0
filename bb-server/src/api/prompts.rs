//! Prompt library endpoints

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
use crate::models::{CreatePromptRequest, Prompt, PromptFilter, UpdatePromptRequest};
use crate::pagination::{calculate_pagination, Page};
use crate::AppState;

/// GET /api/prompts
pub async fn list_prompts(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<PromptFilter>, QueryRejection>,
) -> ApiResult<Json<Page<Prompt>>> {
    let Query(filter) = query?;
    let total = db::prompts::count_prompts(&state.db, user.id(), &filter).await?;
    let pagination = calculate_pagination(total, filter.page, filter.page_size);
    let items = db::prompts::list_prompts(
        &state.db,
        user.id(),
        &filter,
        pagination.page_size,
        pagination.offset,
    )
    .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

/// POST /api/prompts
pub async fn create_prompt(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreatePromptRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Prompt>)> {
    let Json(request) = payload?;
    let prompt = db::prompts::create_prompt(&state.db, user.id(), request).await?;
    Ok((StatusCode::CREATED, Json(prompt)))
}

/// GET /api/prompts/:id
pub async fn get_prompt(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Prompt>> {
    let Path(id) = path?;
    Ok(Json(db::prompts::get_prompt(&state.db, user.id(), id).await?))
}

/// PATCH /api/prompts/:id
pub async fn update_prompt(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdatePromptRequest>, JsonRejection>,
) -> ApiResult<Json<Prompt>> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    Ok(Json(db::prompts::update_prompt(&state.db, user.id(), id, patch).await?))
}

/// DELETE /api/prompts/:id
pub async fn delete_prompt(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    db::prompts::delete_prompt(&state.db, user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/prompts/:id/use
pub async fn use_prompt(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Prompt>> {
    let Path(id) = path?;
    Ok(Json(db::prompts::record_prompt_use(&state.db, user.id(), id).await?))
}
