//! Workflow pattern endpoints

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
use crate::models::{CreateWorkflowRequest, UpdateWorkflowRequest, WorkflowPattern};
use crate::pagination::{calculate_pagination, Page, PageQuery};
use crate::AppState;

/// GET /api/workflows
pub async fn list_workflows(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<Page<WorkflowPattern>>> {
    let Query(query) = query?;
    let total = db::workflows::count_workflows(&state.db, user.id()).await?;
    let pagination = calculate_pagination(total, query.page, query.page_size);
    let items = db::workflows::list_workflows(
        &state.db,
        user.id(),
        pagination.page_size,
        pagination.offset,
    )
    .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

/// POST /api/workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateWorkflowRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WorkflowPattern>)> {
    let Json(request) = payload?;
    let workflow = db::workflows::create_workflow(&state.db, user.id(), request).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// GET /api/workflows/:id
pub async fn get_workflow(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<WorkflowPattern>> {
    let Path(id) = path?;
    Ok(Json(db::workflows::get_workflow(&state.db, user.id(), id).await?))
}

/// PATCH /api/workflows/:id
pub async fn update_workflow(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateWorkflowRequest>, JsonRejection>,
) -> ApiResult<Json<WorkflowPattern>> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    Ok(Json(db::workflows::update_workflow(&state.db, user.id(), id, patch).await?))
}

/// DELETE /api/workflows/:id
pub async fn delete_workflow(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    db::workflows::delete_workflow(&state.db, user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/workflows/:id/use
pub async fn use_workflow(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<WorkflowPattern>> {
    let Path(id) = path?;
    Ok(Json(db::workflows::record_workflow_use(&state.db, user.id(), id).await?))
}
