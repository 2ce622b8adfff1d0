//! Model comparison persistence
//!
//! Entries are stored one row per model, keyed by `(comparison_id, model)`,
//! with `position` preserving the order the models were given in.

use bb_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::assets::get_asset;
use super::projects::ensure_project_owned;
use super::{fmt_time, now, parse_opt_uuid, parse_time, parse_uuid};
use crate::models::{ComparisonEntry, CreateComparisonRequest, ModelComparison, RecordResultRequest};

fn comparison_from_row(row: &SqliteRow, entries: Vec<ComparisonEntry>) -> Result<ModelComparison> {
    Ok(ModelComparison {
        id: parse_uuid(&row.get::<String, _>("id"), "model_comparisons.id")?,
        user_id: row.get("user_id"),
        project_id: parse_opt_uuid(row.get("project_id"), "model_comparisons.project_id")?,
        name: row.get("name"),
        prompt: row.get("prompt"),
        provider: row.get::<String, _>("provider").parse()?,
        entries,
        created_at: parse_time(&row.get::<String, _>("created_at"), "model_comparisons.created_at")?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"), "model_comparisons.updated_at")?,
    })
}

fn entry_from_row(row: &SqliteRow) -> Result<ComparisonEntry> {
    let rating = row
        .get::<Option<i64>, _>("rating")
        .map(|r| {
            u8::try_from(r).map_err(|_| Error::Internal(format!("comparison_entries.rating out of range: {}", r)))
        })
        .transpose()?;

    Ok(ComparisonEntry {
        model: row.get("model"),
        asset_id: parse_opt_uuid(row.get("asset_id"), "comparison_entries.asset_id")?,
        generation_id: parse_opt_uuid(row.get("generation_id"), "comparison_entries.generation_id")?,
        rating,
        notes: row.get("notes"),
    })
}

async fn load_entries(pool: &SqlitePool, comparison_id: &str) -> Result<Vec<ComparisonEntry>> {
    let rows = sqlx::query("SELECT * FROM comparison_entries WHERE comparison_id = ? ORDER BY position")
        .bind(comparison_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(entry_from_row).collect()
}

pub async fn create_comparison(
    pool: &SqlitePool,
    user_id: &str,
    mut request: CreateComparisonRequest,
) -> Result<ModelComparison> {
    request.validate()?;
    if let Some(project_id) = request.project_id {
        ensure_project_owned(pool, user_id, project_id).await?;
    }

    let timestamp = now();
    let comparison = ModelComparison {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        project_id: request.project_id,
        name: request.name,
        prompt: request.prompt,
        provider: request.provider,
        entries: request.models.into_iter().map(ComparisonEntry::new).collect(),
        created_at: timestamp,
        updated_at: timestamp,
    };

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO model_comparisons (id, user_id, project_id, name, prompt, provider, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(comparison.id.to_string())
    .bind(&comparison.user_id)
    .bind(comparison.project_id.map(|id| id.to_string()))
    .bind(&comparison.name)
    .bind(&comparison.prompt)
    .bind(comparison.provider.as_str())
    .bind(fmt_time(comparison.created_at))
    .bind(fmt_time(comparison.updated_at))
    .execute(&mut *tx)
    .await?;

    for (position, entry) in comparison.entries.iter().enumerate() {
        sqlx::query(
            "INSERT INTO comparison_entries (comparison_id, position, model, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(comparison.id.to_string())
        .bind(position as i64)
        .bind(&entry.model)
        .bind(fmt_time(timestamp))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(comparison)
}

pub async fn get_comparison(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<ModelComparison> {
    let row = sqlx::query("SELECT * FROM model_comparisons WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("comparison {}", id)))?;
    let entries = load_entries(pool, &id.to_string()).await?;
    comparison_from_row(&row, entries)
}

pub async fn count_comparisons(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM model_comparisons WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?)
}

/// Most recently updated first, entries included
pub async fn list_comparisons(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<ModelComparison>> {
    let rows = sqlx::query(
        "SELECT * FROM model_comparisons WHERE user_id = ? ORDER BY updated_at DESC, id LIMIT ? OFFSET ?",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut comparisons = Vec::with_capacity(rows.len());
    for row in &rows {
        let entries = load_entries(pool, &row.get::<String, _>("id")).await?;
        comparisons.push(comparison_from_row(row, entries)?);
    }
    Ok(comparisons)
}

pub async fn delete_comparison(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM model_comparisons WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("comparison {}", id)));
    }
    Ok(())
}

async fn save_entry(pool: &SqlitePool, comparison_id: Uuid, entry: &ComparisonEntry) -> Result<()> {
    let timestamp = fmt_time(now());
    sqlx::query(
        r#"
        UPDATE comparison_entries
        SET asset_id = ?, generation_id = ?, rating = ?, notes = ?, updated_at = ?
        WHERE comparison_id = ? AND model = ?
        "#,
    )
    .bind(entry.asset_id.map(|id| id.to_string()))
    .bind(entry.generation_id.map(|id| id.to_string()))
    .bind(entry.rating.map(i64::from))
    .bind(&entry.notes)
    .bind(&timestamp)
    .bind(comparison_id.to_string())
    .bind(&entry.model)
    .execute(pool)
    .await?;

    sqlx::query("UPDATE model_comparisons SET updated_at = ? WHERE id = ?")
        .bind(&timestamp)
        .bind(comparison_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Record an asset, rating or notes against one model of a comparison
pub async fn record_result(
    pool: &SqlitePool,
    user_id: &str,
    id: Uuid,
    request: RecordResultRequest,
) -> Result<ModelComparison> {
    let mut comparison = get_comparison(pool, user_id, id).await?;
    if let Some(Some(asset_id)) = request.asset_id {
        get_asset(pool, user_id, asset_id).await?;
    }

    let model = request.model.trim().to_string();
    let entry = comparison.entry_mut(&model).ok_or_else(|| {
        Error::InvalidInput(format!("model '{}' is not part of this comparison", model))
    })?;
    request.apply_to(entry)?;
    let entry = entry.clone();

    save_entry(pool, id, &entry).await?;
    get_comparison(pool, user_id, id).await
}

/// Remember which generation produced a model's entry
pub async fn set_entry_generation(
    pool: &SqlitePool,
    comparison_id: Uuid,
    model: &str,
    generation_id: Uuid,
) -> Result<()> {
    sqlx::query(
        "UPDATE comparison_entries SET generation_id = ?, updated_at = ? WHERE comparison_id = ? AND model = ?",
    )
    .bind(generation_id.to_string())
    .bind(fmt_time(now()))
    .bind(comparison_id.to_string())
    .bind(model)
    .execute(pool)
    .await?;
    Ok(())
}

/// Attach the first asset of a finished generation to its entry
pub async fn set_entry_asset_for_generation(
    pool: &SqlitePool,
    comparison_id: Uuid,
    generation_id: Uuid,
    asset_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE comparison_entries SET asset_id = ?, updated_at = ? WHERE comparison_id = ? AND generation_id = ?",
    )
    .bind(asset_id.to_string())
    .bind(fmt_time(now()))
    .bind(comparison_id.to_string())
    .bind(generation_id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
