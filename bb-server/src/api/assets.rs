//! Asset endpoints: upload, text assets, listing, content streaming

use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use bb_common::events::BlenderEvent;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::CurrentUser;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::asset::{MAX_TITLE_LEN, extension_for_mime};
use crate::models::{
    normalize_tags, require_text, Asset, AssetFilter, AssetKind, CreateTextAssetRequest, NewAsset,
    UpdateAssetRequest,
};
use crate::pagination::{calculate_pagination, Page};
use crate::storage::{detect_mime, object_key};
use crate::AppState;

/// Store bytes, then insert the row; the object is removed if the insert fails
async fn persist_asset(state: &AppState, new_asset: NewAsset, bytes: Bytes) -> ApiResult<Asset> {
    let storage_key = new_asset.storage_key.clone();
    state.storage.put(&storage_key, bytes).await?;

    let asset = match db::assets::insert_asset(&state.db, new_asset).await {
        Ok(asset) => asset,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&storage_key).await {
                warn!(key = %storage_key, "Failed to remove orphaned object: {}", cleanup);
            }
            return Err(e.into());
        }
    };

    info!(asset_id = %asset.id, kind = %asset.kind, size = asset.size_bytes, "Asset created");
    state.event_bus.emit_lossy(BlenderEvent::AssetCreated {
        asset_id: asset.id,
        user_id: asset.user_id.clone(),
        kind: asset.kind.as_str().to_string(),
        timestamp: Utc::now(),
    });
    Ok(asset)
}

/// GET /api/assets
pub async fn list_assets(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    query: Result<Query<AssetFilter>, QueryRejection>,
) -> ApiResult<Json<Page<Asset>>> {
    let Query(filter) = query?;
    let total = db::assets::count_assets(&state.db, user.id(), &filter).await?;
    let pagination = calculate_pagination(total, filter.page, filter.page_size);
    let items = db::assets::list_assets(
        &state.db,
        user.id(),
        &filter,
        pagination.page_size,
        pagination.offset,
    )
    .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

/// POST /api/assets (text asset)
pub async fn create_text_asset(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateTextAssetRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Asset>)> {
    let Json(mut request) = payload?;
    request.validate()?;
    db::assets::validate_placement(&state.db, user.id(), request.project_id, request.folder_id)
        .await?;

    let asset_id = Uuid::new_v4();
    let bytes = Bytes::from(request.content.into_bytes());
    let new_asset = NewAsset {
        id: asset_id,
        user_id: user.id().to_string(),
        project_id: request.project_id,
        folder_id: request.folder_id,
        kind: AssetKind::Text,
        title: request.title,
        storage_key: object_key(user.id(), asset_id, "content.txt"),
        mime_type: "text/plain".to_string(),
        size_bytes: bytes.len() as i64,
        provider: None,
        model: None,
        prompt: request.prompt,
        parameters: serde_json::json!({}),
        generation_id: None,
        tags: request.tags,
    };

    let asset = persist_asset(&state, new_asset, bytes).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    title: Option<String>,
    project_id: Option<Uuid>,
    folder_id: Option<Uuid>,
    tags: Vec<String>,
}

struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

async fn read_capped(mut field: Field<'_>, limit: u64) -> ApiResult<Bytes> {
    let mut data = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if (data.len() + chunk.len()) as u64 > limit {
            return Err(ApiError::PayloadTooLarge(format!(
                "file exceeds the {} byte upload limit",
                limit
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data.freeze())
}

fn parse_optional_uuid(value: &str, field: &str) -> ApiResult<Option<Uuid>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("{} is not a valid id", field)))
}

async fn read_upload_form(mut multipart: Multipart, limit: u64) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = read_capped(field, limit).await?;
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "title" => form.title = Some(field.text().await.map_err(multipart_error)?),
            "project_id" => {
                form.project_id = parse_optional_uuid(&field.text().await.map_err(multipart_error)?, "project_id")?
            }
            "folder_id" => {
                form.folder_id = parse_optional_uuid(&field.text().await.map_err(multipart_error)?, "folder_id")?
            }
            // Comma separated; the field may also repeat
            "tags" => {
                let text = field.text().await.map_err(multipart_error)?;
                form.tags.extend(
                    text.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                );
            }
            other => warn!(field = other, "Ignoring unknown upload field"),
        }
    }

    Ok(form)
}

/// Title for an upload without an explicit one: the file name without extension
fn default_title(file_name: Option<&str>) -> String {
    let stem = file_name
        .map(|name| name.rsplit(['/', '\\']).next().unwrap_or(name))
        .map(|name| match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        })
        .map(str::trim)
        .filter(|stem| !stem.is_empty());

    match stem {
        Some(stem) => stem.chars().take(MAX_TITLE_LEN).collect(),
        None => "Untitled upload".to_string(),
    }
}

/// POST /api/assets/upload (multipart: file, title?, project_id?, folder_id?, tags?)
pub async fn upload_asset(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Asset>)> {
    let form = read_upload_form(multipart?, state.settings.max_upload_bytes).await?;
    let file = form
        .file
        .ok_or_else(|| ApiError::BadRequest("multipart field 'file' is required".to_string()))?;
    if file.bytes.is_empty() {
        return Err(ApiError::BadRequest("uploaded file is empty".to_string()));
    }

    let mime_type = detect_mime(&file.bytes, file.content_type.as_deref());
    let kind = AssetKind::from_mime(&mime_type)
        .ok_or_else(|| ApiError::BadRequest(format!("unsupported content type '{}'", mime_type)))?;

    let title = match form.title.as_deref() {
        Some(title) if !title.trim().is_empty() => require_text(title, "title", MAX_TITLE_LEN)?,
        _ => default_title(file.file_name.as_deref()),
    };
    let tags = normalize_tags(form.tags)?;
    db::assets::validate_placement(&state.db, user.id(), form.project_id, form.folder_id).await?;

    let asset_id = Uuid::new_v4();
    let file_name = file
        .file_name
        .unwrap_or_else(|| format!("upload.{}", extension_for_mime(&mime_type)));
    let new_asset = NewAsset {
        id: asset_id,
        user_id: user.id().to_string(),
        project_id: form.project_id,
        folder_id: form.folder_id,
        kind,
        title,
        storage_key: object_key(user.id(), asset_id, &file_name),
        mime_type,
        size_bytes: file.bytes.len() as i64,
        provider: None,
        model: None,
        prompt: None,
        parameters: serde_json::json!({}),
        generation_id: None,
        tags,
    };

    let asset = persist_asset(&state, new_asset, file.bytes).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

/// GET /api/assets/:id
pub async fn get_asset(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Asset>> {
    let Path(id) = path?;
    Ok(Json(db::assets::get_asset(&state.db, user.id(), id).await?))
}

/// GET /api/assets/:id/content
pub async fn get_asset_content(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Response> {
    let Path(id) = path?;
    let asset = db::assets::get_asset(&state.db, user.id(), id).await?;
    let stream = state.storage.get_stream(&asset.storage_key).await?;

    let file_name = asset.storage_key.rsplit('/').next().unwrap_or("content");
    Ok((
        [
            (header::CONTENT_TYPE, asset.mime_type.clone()),
            (header::CONTENT_LENGTH, asset.size_bytes.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file_name),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// PATCH /api/assets/:id
pub async fn update_asset(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateAssetRequest>, JsonRejection>,
) -> ApiResult<Json<Asset>> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    Ok(Json(db::assets::update_asset(&state.db, user.id(), id, patch).await?))
}

/// DELETE /api/assets/:id
///
/// The row goes first; a stored object that is already missing is only logged.
pub async fn delete_asset(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    let asset = db::assets::delete_asset(&state.db, user.id(), id).await?;

    match state.storage.delete(&asset.storage_key).await {
        Ok(true) => {}
        Ok(false) => warn!(asset_id = %id, key = %asset.storage_key, "Stored object was already missing"),
        Err(e) => warn!(asset_id = %id, key = %asset.storage_key, "Failed to delete stored object: {}", e),
    }

    info!(asset_id = %id, "Asset deleted");
    state.event_bus.emit_lossy(BlenderEvent::AssetDeleted {
        asset_id: id,
        user_id: asset.user_id,
        timestamp: Utc::now(),
    });
    Ok(StatusCode::NO_CONTENT)
}
