//! Prompt library persistence

use bb_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::projects::ensure_project_owned;
use super::{fmt_time, from_json, like_pattern, now, parse_opt_time, parse_opt_uuid, parse_time, parse_uuid, to_json};
use crate::models::{CreatePromptRequest, Prompt, PromptFilter, UpdatePromptRequest};

fn prompt_from_row(row: &SqliteRow) -> Result<Prompt> {
    Ok(Prompt {
        id: parse_uuid(&row.get::<String, _>("id"), "prompts.id")?,
        user_id: row.get("user_id"),
        project_id: parse_opt_uuid(row.get("project_id"), "prompts.project_id")?,
        title: row.get("title"),
        text: row.get("text"),
        negative_prompt: row.get("negative_prompt"),
        category: row.get("category"),
        tags: from_json(&row.get::<String, _>("tags"), "prompts.tags")?,
        favorite: row.get::<i64, _>("favorite") != 0,
        use_count: row.get("use_count"),
        last_used_at: parse_opt_time(row.get("last_used_at"), "prompts.last_used_at")?,
        created_at: parse_time(&row.get::<String, _>("created_at"), "prompts.created_at")?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"), "prompts.updated_at")?,
    })
}

pub async fn create_prompt(pool: &SqlitePool, user_id: &str, mut request: CreatePromptRequest) -> Result<Prompt> {
    request.validate()?;
    if let Some(project_id) = request.project_id {
        ensure_project_owned(pool, user_id, project_id).await?;
    }

    let timestamp = now();
    let prompt = Prompt {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        project_id: request.project_id,
        title: request.title,
        text: request.text,
        negative_prompt: request.negative_prompt,
        category: request.category,
        tags: request.tags,
        favorite: request.favorite,
        use_count: 0,
        last_used_at: None,
        created_at: timestamp,
        updated_at: timestamp,
    };

    sqlx::query(
        r#"
        INSERT INTO prompts (
            id, user_id, project_id, title, text, negative_prompt, category, tags,
            favorite, use_count, last_used_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?, ?)
        "#,
    )
    .bind(prompt.id.to_string())
    .bind(&prompt.user_id)
    .bind(prompt.project_id.map(|id| id.to_string()))
    .bind(&prompt.title)
    .bind(&prompt.text)
    .bind(&prompt.negative_prompt)
    .bind(&prompt.category)
    .bind(to_json(&prompt.tags, "prompts.tags")?)
    .bind(prompt.favorite as i64)
    .bind(fmt_time(prompt.created_at))
    .bind(fmt_time(prompt.updated_at))
    .execute(pool)
    .await?;

    Ok(prompt)
}

pub async fn get_prompt(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<Prompt> {
    let row = sqlx::query("SELECT * FROM prompts WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("prompt {}", id)))?;
    prompt_from_row(&row)
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, user_id: &'a str, filter: &'a PromptFilter) {
    builder.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(project_id) = filter.project_id {
        builder.push(" AND project_id = ").push_bind(project_id.to_string());
    }
    if let Some(category) = filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        builder.push(" AND category = ").push_bind(category);
    }
    if let Some(favorite) = filter.favorite {
        builder.push(" AND favorite = ").push_bind(favorite as i64);
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = like_pattern(q);
        builder
            .push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR text LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(tag) = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        builder
            .push(" AND EXISTS (SELECT 1 FROM json_each(prompts.tags) WHERE json_each.value = ")
            .push_bind(tag)
            .push(")");
    }
}

pub async fn count_prompts(pool: &SqlitePool, user_id: &str, filter: &PromptFilter) -> Result<i64> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM prompts");
    push_filter(&mut builder, user_id, filter);
    Ok(builder.build_query_scalar::<i64>().fetch_one(pool).await?)
}

/// Favorites first, then most recently updated
pub async fn list_prompts(
    pool: &SqlitePool,
    user_id: &str,
    filter: &PromptFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Prompt>> {
    let mut builder = QueryBuilder::new("SELECT * FROM prompts");
    push_filter(&mut builder, user_id, filter);
    builder
        .push(" ORDER BY favorite DESC, updated_at DESC, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(prompt_from_row).collect()
}

pub async fn update_prompt(
    pool: &SqlitePool,
    user_id: &str,
    id: Uuid,
    patch: UpdatePromptRequest,
) -> Result<Prompt> {
    let mut prompt = get_prompt(pool, user_id, id).await?;
    prompt.apply(patch)?;
    if let Some(project_id) = prompt.project_id {
        ensure_project_owned(pool, user_id, project_id).await?;
    }
    prompt.updated_at = now();

    sqlx::query(
        r#"
        UPDATE prompts
        SET project_id = ?, title = ?, text = ?, negative_prompt = ?, category = ?,
            tags = ?, favorite = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(prompt.project_id.map(|id| id.to_string()))
    .bind(&prompt.title)
    .bind(&prompt.text)
    .bind(&prompt.negative_prompt)
    .bind(&prompt.category)
    .bind(to_json(&prompt.tags, "prompts.tags")?)
    .bind(prompt.favorite as i64)
    .bind(fmt_time(prompt.updated_at))
    .bind(prompt.id.to_string())
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(prompt)
}

pub async fn delete_prompt(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM prompts WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("prompt {}", id)));
    }
    Ok(())
}

/// Increment `use_count` and stamp `last_used_at`
pub async fn record_prompt_use(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<Prompt> {
    let result = sqlx::query(
        "UPDATE prompts SET use_count = use_count + 1, last_used_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(fmt_time(now()))
    .bind(id.to_string())
    .bind(user_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("prompt {}", id)));
    }
    get_prompt(pool, user_id, id).await
}
