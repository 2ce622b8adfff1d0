//! Workflow pattern persistence

use bb_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{fmt_time, from_json, now, parse_opt_time, parse_time, parse_uuid, to_json};
use crate::models::{CreateWorkflowRequest, UpdateWorkflowRequest, WorkflowPattern};

fn workflow_from_row(row: &SqliteRow) -> Result<WorkflowPattern> {
    Ok(WorkflowPattern {
        id: parse_uuid(&row.get::<String, _>("id"), "workflow_patterns.id")?,
        user_id: row.get("user_id"),
        name: row.get("name"),
        description: row.get("description"),
        steps: from_json(&row.get::<String, _>("steps"), "workflow_patterns.steps")?,
        tags: from_json(&row.get::<String, _>("tags"), "workflow_patterns.tags")?,
        use_count: row.get("use_count"),
        last_used_at: parse_opt_time(row.get("last_used_at"), "workflow_patterns.last_used_at")?,
        created_at: parse_time(&row.get::<String, _>("created_at"), "workflow_patterns.created_at")?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"), "workflow_patterns.updated_at")?,
    })
}

pub async fn create_workflow(
    pool: &SqlitePool,
    user_id: &str,
    mut request: CreateWorkflowRequest,
) -> Result<WorkflowPattern> {
    request.validate()?;

    let timestamp = now();
    let workflow = WorkflowPattern {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        name: request.name,
        description: request.description,
        steps: request.steps,
        tags: request.tags,
        use_count: 0,
        last_used_at: None,
        created_at: timestamp,
        updated_at: timestamp,
    };

    sqlx::query(
        r#"
        INSERT INTO workflow_patterns (id, user_id, name, description, steps, tags, use_count, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(workflow.id.to_string())
    .bind(&workflow.user_id)
    .bind(&workflow.name)
    .bind(&workflow.description)
    .bind(to_json(&workflow.steps, "workflow_patterns.steps")?)
    .bind(to_json(&workflow.tags, "workflow_patterns.tags")?)
    .bind(fmt_time(workflow.created_at))
    .bind(fmt_time(workflow.updated_at))
    .execute(pool)
    .await?;

    Ok(workflow)
}

pub async fn get_workflow(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<WorkflowPattern> {
    let row = sqlx::query("SELECT * FROM workflow_patterns WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("workflow {}", id)))?;
    workflow_from_row(&row)
}

pub async fn count_workflows(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM workflow_patterns WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?)
}

/// Most used first
pub async fn list_workflows(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<WorkflowPattern>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM workflow_patterns WHERE user_id = ?
        ORDER BY use_count DESC, updated_at DESC, id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    rows.iter().map(workflow_from_row).collect()
}

pub async fn update_workflow(
    pool: &SqlitePool,
    user_id: &str,
    id: Uuid,
    patch: UpdateWorkflowRequest,
) -> Result<WorkflowPattern> {
    let mut workflow = get_workflow(pool, user_id, id).await?;
    workflow.apply(patch)?;
    workflow.updated_at = now();

    sqlx::query(
        r#"
        UPDATE workflow_patterns
        SET name = ?, description = ?, steps = ?, tags = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(&workflow.name)
    .bind(&workflow.description)
    .bind(to_json(&workflow.steps, "workflow_patterns.steps")?)
    .bind(to_json(&workflow.tags, "workflow_patterns.tags")?)
    .bind(fmt_time(workflow.updated_at))
    .bind(workflow.id.to_string())
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(workflow)
}

pub async fn delete_workflow(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM workflow_patterns WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("workflow {}", id)));
    }
    Ok(())
}

pub async fn record_workflow_use(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<WorkflowPattern> {
    let result = sqlx::query(
        "UPDATE workflow_patterns SET use_count = use_count + 1, last_used_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(fmt_time(now()))
    .bind(id.to_string())
    .bind(user_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("workflow {}", id)));
    }
    get_workflow(pool, user_id, id).await
}
