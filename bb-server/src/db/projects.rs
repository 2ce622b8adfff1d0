//! Project persistence

use bb_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{fmt_time, now, parse_time, parse_uuid};
use crate::models::{Project, ProjectSummary};

fn duplicate_name(name: &str) -> String {
    format!("A project named '{}' already exists", name)
}

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    Ok(Project {
        id: parse_uuid(&row.get::<String, _>("id"), "projects.id")?,
        user_id: row.get("user_id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: parse_time(&row.get::<String, _>("created_at"), "projects.created_at")?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"), "projects.updated_at")?,
    })
}

/// Insert a project with an already-validated name
pub async fn insert_project(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
    description: Option<&str>,
) -> Result<Project> {
    let timestamp = now();
    let project = Project {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        name: name.to_string(),
        description: description.map(str::to_string),
        created_at: timestamp,
        updated_at: timestamp,
    };

    sqlx::query(
        "INSERT INTO projects (id, user_id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(project.id.to_string())
    .bind(&project.user_id)
    .bind(&project.name)
    .bind(&project.description)
    .bind(fmt_time(project.created_at))
    .bind(fmt_time(project.updated_at))
    .execute(pool)
    .await
    .map_err(|e| Error::from_unique_violation(e, duplicate_name(name)))?;

    Ok(project)
}

pub async fn get_project(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<Project> {
    let row = sqlx::query("SELECT * FROM projects WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("project {}", id)))?;
    project_from_row(&row)
}

/// Project plus folder and asset counts
pub async fn get_project_summary(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<ProjectSummary> {
    let project = get_project(pool, user_id, id).await?;

    let folder_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE project_id = ?")
        .bind(id.to_string())
        .fetch_one(pool)
        .await?;
    let asset_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assets WHERE project_id = ?")
        .bind(id.to_string())
        .fetch_one(pool)
        .await?;

    Ok(ProjectSummary {
        project,
        folder_count,
        asset_count,
    })
}

pub async fn count_projects(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Most recently updated first
pub async fn list_projects(pool: &SqlitePool, user_id: &str, limit: i64, offset: i64) -> Result<Vec<Project>> {
    let rows = sqlx::query(
        "SELECT * FROM projects WHERE user_id = ? ORDER BY updated_at DESC, id LIMIT ? OFFSET ?",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(project_from_row).collect()
}

/// Persist name/description of a project, bumping `updated_at`
pub async fn update_project(pool: &SqlitePool, project: &mut Project) -> Result<()> {
    project.updated_at = now();
    let result = sqlx::query(
        "UPDATE projects SET name = ?, description = ?, updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(fmt_time(project.updated_at))
    .bind(project.id.to_string())
    .bind(&project.user_id)
    .execute(pool)
    .await
    .map_err(|e| Error::from_unique_violation(e, duplicate_name(&project.name)))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("project {}", project.id)));
    }
    Ok(())
}

/// Mark a project as recently changed
pub async fn touch_project(pool: &SqlitePool, project_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE projects SET updated_at = ? WHERE id = ?")
        .bind(fmt_time(now()))
        .bind(project_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a project and its folders; its assets stay, unassigned
pub async fn delete_project(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;

    let owned: Option<String> = sqlx::query_scalar("SELECT id FROM projects WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if owned.is_none() {
        return Err(Error::NotFound(format!("project {}", id)));
    }

    sqlx::query("UPDATE assets SET project_id = NULL, folder_id = NULL, updated_at = ? WHERE project_id = ?")
        .bind(fmt_time(now()))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Verify that `project_id` exists and belongs to `user_id`
pub async fn ensure_project_owned(pool: &SqlitePool, user_id: &str, project_id: Uuid) -> Result<()> {
    let found: Option<String> = sqlx::query_scalar("SELECT id FROM projects WHERE id = ? AND user_id = ?")
        .bind(project_id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(Error::NotFound(format!("project {}", project_id))),
    }
}
