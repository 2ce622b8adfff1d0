//! Project endpoints

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
use crate::models::{CreateProjectRequest, Project, ProjectSummary, UpdateProjectRequest};
use crate::pagination::{calculate_pagination, Page, PageQuery};
use crate::AppState;

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<Page<Project>>> {
    let Query(query) = query?;
    let total = db::projects::count_projects(&state.db, user.id()).await?;
    let pagination = calculate_pagination(total, query.page, query.page_size);
    let items =
        db::projects::list_projects(&state.db, user.id(), pagination.page_size, pagination.offset)
            .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let Json(request) = payload?;
    let (name, description) = request.validate()?;
    let project =
        db::projects::insert_project(&state.db, user.id(), &name, description.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects/:id
pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ProjectSummary>> {
    let Path(id) = path?;
    Ok(Json(db::projects::get_project_summary(&state.db, user.id(), id).await?))
}

/// PATCH /api/projects/:id
pub async fn update_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateProjectRequest>, JsonRejection>,
) -> ApiResult<Json<Project>> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    let mut project = db::projects::get_project(&state.db, user.id(), id).await?;
    project.apply(patch)?;
    db::projects::update_project(&state.db, &mut project).await?;
    Ok(Json(project))
}

/// DELETE /api/projects/:id
///
/// Folders go with the project; its assets stay in the library unassigned.
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    db::projects::delete_project(&state.db, user.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
