//! Asset persistence
//!
//! Rows describe content whose bytes live in object storage under
//! `storage_key`. Callers store the bytes first and insert the row second.

use bb_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::folders::ensure_folder_in_project;
use super::projects::ensure_project_owned;
use super::{fmt_time, from_json, like_pattern, now, parse_opt_uuid, parse_time, parse_uuid, to_json};
use crate::models::{normalize_tags, require_text, Asset, AssetFilter, NewAsset, UpdateAssetRequest};
use crate::models::asset::MAX_TITLE_LEN;

pub(crate) fn asset_from_row(row: &SqliteRow) -> Result<Asset> {
    Ok(Asset {
        id: parse_uuid(&row.get::<String, _>("id"), "assets.id")?,
        user_id: row.get("user_id"),
        project_id: parse_opt_uuid(row.get("project_id"), "assets.project_id")?,
        folder_id: parse_opt_uuid(row.get("folder_id"), "assets.folder_id")?,
        kind: row.get::<String, _>("kind").parse()?,
        title: row.get("title"),
        storage_key: row.get("storage_key"),
        mime_type: row.get("mime_type"),
        size_bytes: row.get("size_bytes"),
        provider: row.get("provider"),
        model: row.get("model"),
        prompt: row.get("prompt"),
        parameters: from_json(&row.get::<String, _>("parameters"), "assets.parameters")?,
        generation_id: parse_opt_uuid(row.get("generation_id"), "assets.generation_id")?,
        tags: from_json(&row.get::<String, _>("tags"), "assets.tags")?,
        favorite: row.get::<i64, _>("favorite") != 0,
        created_at: parse_time(&row.get::<String, _>("created_at"), "assets.created_at")?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"), "assets.updated_at")?,
    })
}

/// Check that a project/folder placement is owned by the user and consistent
pub async fn validate_placement(
    pool: &SqlitePool,
    user_id: &str,
    project_id: Option<Uuid>,
    folder_id: Option<Uuid>,
) -> Result<()> {
    match (project_id, folder_id) {
        (None, Some(_)) => Err(Error::InvalidInput("folder_id requires project_id".to_string())),
        (Some(project_id), None) => ensure_project_owned(pool, user_id, project_id).await,
        (Some(project_id), Some(folder_id)) => {
            ensure_project_owned(pool, user_id, project_id).await?;
            ensure_folder_in_project(pool, user_id, folder_id, project_id).await
        }
        (None, None) => Ok(()),
    }
}

pub async fn insert_asset(pool: &SqlitePool, asset: NewAsset) -> Result<Asset> {
    let timestamp = now();
    let asset = Asset {
        id: asset.id,
        user_id: asset.user_id,
        project_id: asset.project_id,
        folder_id: asset.folder_id,
        kind: asset.kind,
        title: asset.title,
        storage_key: asset.storage_key,
        mime_type: asset.mime_type,
        size_bytes: asset.size_bytes,
        provider: asset.provider,
        model: asset.model,
        prompt: asset.prompt,
        parameters: asset.parameters,
        generation_id: asset.generation_id,
        tags: asset.tags,
        favorite: false,
        created_at: timestamp,
        updated_at: timestamp,
    };

    sqlx::query(
        r#"
        INSERT INTO assets (
            id, user_id, project_id, folder_id, kind, title, storage_key, mime_type,
            size_bytes, provider, model, prompt, parameters, generation_id, tags,
            favorite, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(asset.id.to_string())
    .bind(&asset.user_id)
    .bind(asset.project_id.map(|id| id.to_string()))
    .bind(asset.folder_id.map(|id| id.to_string()))
    .bind(asset.kind.as_str())
    .bind(&asset.title)
    .bind(&asset.storage_key)
    .bind(&asset.mime_type)
    .bind(asset.size_bytes)
    .bind(&asset.provider)
    .bind(&asset.model)
    .bind(&asset.prompt)
    .bind(to_json(&asset.parameters, "assets.parameters")?)
    .bind(asset.generation_id.map(|id| id.to_string()))
    .bind(to_json(&asset.tags, "assets.tags")?)
    .bind(fmt_time(asset.created_at))
    .bind(fmt_time(asset.updated_at))
    .execute(pool)
    .await?;

    Ok(asset)
}

pub async fn get_asset(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<Asset> {
    let row = sqlx::query("SELECT * FROM assets WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("asset {}", id)))?;
    asset_from_row(&row)
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, user_id: &'a str, filter: &'a AssetFilter) {
    builder.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(project_id) = filter.project_id {
        builder.push(" AND project_id = ").push_bind(project_id.to_string());
    }
    if let Some(folder_id) = filter.folder_id {
        builder.push(" AND folder_id = ").push_bind(folder_id.to_string());
    }
    if let Some(kind) = filter.kind {
        builder.push(" AND kind = ").push_bind(kind.as_str());
    }
    if let Some(favorite) = filter.favorite {
        builder.push(" AND favorite = ").push_bind(favorite as i64);
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = like_pattern(q);
        builder
            .push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR prompt LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(tag) = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        builder
            .push(" AND EXISTS (SELECT 1 FROM json_each(assets.tags) WHERE json_each.value = ")
            .push_bind(tag)
            .push(")");
    }
}

pub async fn count_assets(pool: &SqlitePool, user_id: &str, filter: &AssetFilter) -> Result<i64> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM assets");
    push_filter(&mut builder, user_id, filter);
    let count = builder.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

/// Newest first
pub async fn list_assets(
    pool: &SqlitePool,
    user_id: &str,
    filter: &AssetFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Asset>> {
    let mut builder = QueryBuilder::new("SELECT * FROM assets");
    push_filter(&mut builder, user_id, filter);
    builder
        .push(" ORDER BY created_at DESC, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(asset_from_row).collect()
}

/// Apply a PATCH to an asset
///
/// Moving an asset to another project without naming a folder drops the
/// old folder, which belonged to the previous project.
pub async fn update_asset(
    pool: &SqlitePool,
    user_id: &str,
    id: Uuid,
    patch: UpdateAssetRequest,
) -> Result<Asset> {
    let mut asset = get_asset(pool, user_id, id).await?;

    if let Some(title) = patch.title {
        asset.title = require_text(&title, "title", MAX_TITLE_LEN)?;
    }
    if let Some(tags) = patch.tags {
        asset.tags = normalize_tags(tags)?;
    }
    if let Some(favorite) = patch.favorite {
        asset.favorite = favorite;
    }

    let project_changed = match patch.project_id {
        Some(project_id) if project_id != asset.project_id => {
            asset.project_id = project_id;
            true
        }
        _ => false,
    };
    match patch.folder_id {
        Some(folder_id) => asset.folder_id = folder_id,
        None if project_changed => asset.folder_id = None,
        None => {}
    }
    validate_placement(pool, user_id, asset.project_id, asset.folder_id).await?;

    asset.updated_at = now();
    sqlx::query(
        r#"
        UPDATE assets
        SET title = ?, tags = ?, favorite = ?, project_id = ?, folder_id = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(&asset.title)
    .bind(to_json(&asset.tags, "assets.tags")?)
    .bind(asset.favorite as i64)
    .bind(asset.project_id.map(|id| id.to_string()))
    .bind(asset.folder_id.map(|id| id.to_string()))
    .bind(fmt_time(asset.updated_at))
    .bind(asset.id.to_string())
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(asset)
}

/// Delete the row and return it so the caller can remove the stored object
pub async fn delete_asset(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<Asset> {
    let asset = get_asset(pool, user_id, id).await?;
    sqlx::query("DELETE FROM assets WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(asset)
}
