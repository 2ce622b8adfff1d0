//! Generation job persistence
//!
//! Terminal transitions only apply to rows still `pending`; each returns
//! whether it won, so completion, failure and cancellation cannot both
//! land on the same job.

use bb_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{fmt_time, from_json, now, parse_opt_time, parse_opt_uuid, parse_time, parse_uuid, to_json};
use crate::models::{GenerationFilter, GenerationJob, JobStatus};

fn generation_from_row(row: &SqliteRow) -> Result<GenerationJob> {
    Ok(GenerationJob {
        id: parse_uuid(&row.get::<String, _>("id"), "generations.id")?,
        user_id: row.get("user_id"),
        provider: row.get::<String, _>("provider").parse()?,
        kind: row.get::<String, _>("kind").parse()?,
        model: row.get("model"),
        prompt: row.get("prompt"),
        negative_prompt: row.get("negative_prompt"),
        parameters: from_json(&row.get::<String, _>("parameters"), "generations.parameters")?,
        inputs: from_json(&row.get::<String, _>("inputs"), "generations.inputs")?,
        provider_job_id: row.get("provider_job_id"),
        status: row.get::<String, _>("status").parse()?,
        error: row.get("error"),
        output_urls: from_json(&row.get::<String, _>("output_urls"), "generations.output_urls")?,
        asset_ids: from_json(&row.get::<String, _>("asset_ids"), "generations.asset_ids")?,
        project_id: parse_opt_uuid(row.get("project_id"), "generations.project_id")?,
        folder_id: parse_opt_uuid(row.get("folder_id"), "generations.folder_id")?,
        experiment_id: parse_opt_uuid(row.get("experiment_id"), "generations.experiment_id")?,
        comparison_id: parse_opt_uuid(row.get("comparison_id"), "generations.comparison_id")?,
        title: row.get("title"),
        attempts: row.get::<i64, _>("attempts").try_into().unwrap_or(u32::MAX),
        created_at: parse_time(&row.get::<String, _>("created_at"), "generations.created_at")?,
        completed_at: parse_opt_time(row.get("completed_at"), "generations.completed_at")?,
    })
}

pub async fn insert_generation(pool: &SqlitePool, job: &GenerationJob) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO generations (
            id, user_id, provider, kind, model, prompt, negative_prompt, parameters, inputs,
            provider_job_id, status, error, output_urls, asset_ids, project_id, folder_id,
            experiment_id, comparison_id, title, attempts, created_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.id.to_string())
    .bind(&job.user_id)
    .bind(job.provider.as_str())
    .bind(job.kind.as_str())
    .bind(&job.model)
    .bind(&job.prompt)
    .bind(&job.negative_prompt)
    .bind(to_json(&job.parameters, "generations.parameters")?)
    .bind(to_json(&job.inputs, "generations.inputs")?)
    .bind(&job.provider_job_id)
    .bind(job.status.as_str())
    .bind(&job.error)
    .bind(to_json(&job.output_urls, "generations.output_urls")?)
    .bind(to_json(&job.asset_ids, "generations.asset_ids")?)
    .bind(job.project_id.map(|id| id.to_string()))
    .bind(job.folder_id.map(|id| id.to_string()))
    .bind(job.experiment_id.map(|id| id.to_string()))
    .bind(job.comparison_id.map(|id| id.to_string()))
    .bind(&job.title)
    .bind(i64::from(job.attempts))
    .bind(fmt_time(job.created_at))
    .bind(job.completed_at.map(fmt_time))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_generation(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<GenerationJob> {
    let row = sqlx::query("SELECT * FROM generations WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("generation {}", id)))?;
    generation_from_row(&row)
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, user_id: &'a str, filter: &GenerationFilter) {
    builder.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(provider) = filter.provider {
        builder.push(" AND provider = ").push_bind(provider.as_str());
    }
}

pub async fn count_generations(pool: &SqlitePool, user_id: &str, filter: &GenerationFilter) -> Result<i64> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM generations");
    push_filter(&mut builder, user_id, filter);
    Ok(builder.build_query_scalar::<i64>().fetch_one(pool).await?)
}

/// Newest first
pub async fn list_generations(
    pool: &SqlitePool,
    user_id: &str,
    filter: &GenerationFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<GenerationJob>> {
    let mut builder = QueryBuilder::new("SELECT * FROM generations");
    push_filter(&mut builder, user_id, filter);
    builder
        .push(" ORDER BY created_at DESC, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(generation_from_row).collect()
}

/// Every job still waiting on its provider, across all users
pub async fn list_pending_generations(pool: &SqlitePool) -> Result<Vec<GenerationJob>> {
    let rows = sqlx::query("SELECT * FROM generations WHERE status = 'pending' ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    rows.iter().map(generation_from_row).collect()
}

pub async fn update_attempts(pool: &SqlitePool, id: Uuid, attempts: u32) -> Result<()> {
    sqlx::query("UPDATE generations SET attempts = ? WHERE id = ? AND status = 'pending'")
        .bind(i64::from(attempts))
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_succeeded(
    pool: &SqlitePool,
    id: Uuid,
    output_urls: &[String],
    asset_ids: &[Uuid],
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE generations
        SET status = ?, output_urls = ?, asset_ids = ?, error = NULL, completed_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(JobStatus::Succeeded.as_str())
    .bind(to_json(output_urls, "generations.output_urls")?)
    .bind(to_json(asset_ids, "generations.asset_ids")?)
    .bind(fmt_time(now()))
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_failed(pool: &SqlitePool, id: Uuid, error: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE generations SET status = ?, error = ?, completed_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(JobStatus::Failed.as_str())
    .bind(error)
    .bind(fmt_time(now()))
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_cancelled(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE generations SET status = ?, completed_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(JobStatus::Cancelled.as_str())
    .bind(fmt_time(now()))
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::{GenerationInputs, GenerationKind, ProviderKind};
    use serde_json::json;

    pub fn pending_job(user: &str, provider: ProviderKind, kind: GenerationKind) -> GenerationJob {
        GenerationJob {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            provider,
            kind,
            model: Some("owner/model".into()),
            prompt: Some("a lighthouse at dusk".into()),
            negative_prompt: None,
            parameters: json!({"width": 1024}),
            inputs: GenerationInputs::default(),
            provider_job_id: "job-1".into(),
            status: JobStatus::Pending,
            error: None,
            output_urls: vec![],
            asset_ids: vec![],
            project_id: None,
            folder_id: None,
            experiment_id: None,
            comparison_id: None,
            title: None,
            attempts: 0,
            created_at: now(),
            completed_at: None,
        }
    }
}
