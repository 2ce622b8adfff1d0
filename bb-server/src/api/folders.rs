//! Folder endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use super::CurrentUser;
use crate::db;
use crate::error::ApiResult;
use crate::models::{CreateFolderRequest, Folder, UpdateFolderRequest};
use crate::AppState;

/// GET /api/projects/:id/folders
pub async fn list_folders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Vec<Folder>>> {
    let Path(project_id) = path?;
    Ok(Json(db::folders::list_folders(&state.db, user.id(), project_id).await?))
}

/// POST /api/projects/:id/folders
pub async fn create_folder(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CreateFolderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Folder>)> {
    let Path(project_id) = path?;
    let Json(request) = payload?;
    let folder = db::folders::create_folder(
        &state.db,
        user.id(),
        project_id,
        request.parent_id,
        &request.name,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

/// GET /api/folders/:id
pub async fn get_folder(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Folder>> {
    let Path(id) = path?;
    Ok(Json(db::folders::get_folder(&state.db, user.id(), id).await?))
}

/// PATCH /api/folders/:id (rename and/or move)
pub async fn update_folder(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateFolderRequest>, JsonRejection>,
) -> ApiResult<Json<Folder>> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    Ok(Json(db::folders::update_folder(&state.db, user.id(), id, patch).await?))
}

/// DELETE /api/folders/:id
pub async fn delete_folder(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    db::folders::delete_folder(&state.db, user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
