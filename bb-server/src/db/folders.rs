//! Folder persistence and materialized path maintenance
//!
//! A folder's `path` is derived from its parent's path and its own name.
//! Renames and moves rewrite the path of the folder and every descendant
//! inside one transaction, so the table never holds a stale subtree.

use bb_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::projects::{ensure_project_owned, touch_project};
use super::{fmt_time, now, parse_opt_uuid, parse_time, parse_uuid};
use crate::models::folder::{is_same_or_descendant, join_path, rebase_path, validate_folder_name, SEPARATOR};
use crate::models::{Folder, UpdateFolderRequest};

fn already_exists(name: &str) -> String {
    format!("A folder named '{}' already exists here", name)
}

fn folder_from_row(row: &SqliteRow) -> Result<Folder> {
    Ok(Folder {
        id: parse_uuid(&row.get::<String, _>("id"), "folders.id")?,
        user_id: row.get("user_id"),
        project_id: parse_uuid(&row.get::<String, _>("project_id"), "folders.project_id")?,
        parent_id: parse_opt_uuid(row.get("parent_id"), "folders.parent_id")?,
        name: row.get("name"),
        path: row.get("path"),
        created_at: parse_time(&row.get::<String, _>("created_at"), "folders.created_at")?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"), "folders.updated_at")?,
    })
}

pub async fn get_folder(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<Folder> {
    let row = sqlx::query("SELECT * FROM folders WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("folder {}", id)))?;
    folder_from_row(&row)
}

/// True when another folder of the project already uses `path`
async fn path_taken<'e, E>(executor: E, project_id: Uuid, path: &str, except: Option<Uuid>) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let existing: Option<String> = sqlx::query_scalar(
        "SELECT id FROM folders WHERE project_id = ? AND path = ? AND id IS NOT ?",
    )
    .bind(project_id.to_string())
    .bind(path)
    .bind(except.map(|id| id.to_string()))
    .fetch_optional(executor)
    .await?;
    Ok(existing.is_some())
}

/// Create a folder at the project root or under `parent_id`
pub async fn create_folder(
    pool: &SqlitePool,
    user_id: &str,
    project_id: Uuid,
    parent_id: Option<Uuid>,
    name: &str,
) -> Result<Folder> {
    let name = validate_folder_name(name)?;
    ensure_project_owned(pool, user_id, project_id).await?;

    let parent_path = match parent_id {
        Some(pid) => {
            let parent = get_folder(pool, user_id, pid).await?;
            if parent.project_id != project_id {
                return Err(Error::InvalidInput(
                    "parent folder belongs to a different project".to_string(),
                ));
            }
            Some(parent.path)
        }
        None => None,
    };
    let path = join_path(parent_path.as_deref(), &name);

    if path_taken(pool, project_id, &path, None).await? {
        return Err(Error::Conflict(already_exists(&name)));
    }

    let timestamp = now();
    let folder = Folder {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        project_id,
        parent_id,
        name,
        path,
        created_at: timestamp,
        updated_at: timestamp,
    };

    // The UNIQUE(project_id, path) constraint catches a concurrent insert
    sqlx::query(
        "INSERT INTO folders (id, user_id, project_id, parent_id, name, path, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(folder.id.to_string())
    .bind(&folder.user_id)
    .bind(folder.project_id.to_string())
    .bind(folder.parent_id.map(|id| id.to_string()))
    .bind(&folder.name)
    .bind(&folder.path)
    .bind(fmt_time(folder.created_at))
    .bind(fmt_time(folder.updated_at))
    .execute(pool)
    .await
    .map_err(|e| Error::from_unique_violation(e, already_exists(&folder.name)))?;

    touch_project(pool, project_id).await?;
    Ok(folder)
}

/// All folders of a project ordered by path
pub async fn list_folders(pool: &SqlitePool, user_id: &str, project_id: Uuid) -> Result<Vec<Folder>> {
    ensure_project_owned(pool, user_id, project_id).await?;
    let rows = sqlx::query("SELECT * FROM folders WHERE project_id = ? AND user_id = ? ORDER BY path")
        .bind(project_id.to_string())
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(folder_from_row).collect()
}

/// Rename and/or move a folder, rewriting its subtree's paths
pub async fn update_folder(
    pool: &SqlitePool,
    user_id: &str,
    id: Uuid,
    patch: UpdateFolderRequest,
) -> Result<Folder> {
    let mut folder = get_folder(pool, user_id, id).await?;

    let name = match patch.name {
        Some(name) => validate_folder_name(&name)?,
        None => folder.name.clone(),
    };
    let parent_id = match patch.parent_id {
        Some(new_parent) => new_parent,
        None => folder.parent_id,
    };

    if parent_id == Some(folder.id) {
        return Err(Error::InvalidInput("a folder cannot be moved into itself".to_string()));
    }

    let parent_path = match parent_id {
        Some(pid) => {
            let parent = get_folder(pool, user_id, pid).await?;
            if parent.project_id != folder.project_id {
                return Err(Error::InvalidInput(
                    "moving folders between projects is not supported".to_string(),
                ));
            }
            if is_same_or_descendant(&parent.path, &folder.path) {
                return Err(Error::InvalidInput(
                    "a folder cannot be moved into its own subtree".to_string(),
                ));
            }
            Some(parent.path)
        }
        None => None,
    };

    let old_path = folder.path.clone();
    let new_path = join_path(parent_path.as_deref(), &name);
    if new_path == old_path && parent_id == folder.parent_id {
        return Ok(folder);
    }

    let mut tx = pool.begin().await?;

    if path_taken(&mut *tx, folder.project_id, &new_path, Some(folder.id)).await? {
        return Err(Error::Conflict(already_exists(&name)));
    }

    let timestamp = now();
    sqlx::query("UPDATE folders SET name = ?, parent_id = ?, path = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(parent_id.map(|id| id.to_string()))
        .bind(&new_path)
        .bind(fmt_time(timestamp))
        .bind(folder.id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::from_unique_violation(e, already_exists(&name)))?;

    let descendant_prefix = format!("{}{}", old_path, SEPARATOR);
    let descendants: Vec<(String, String)> = sqlx::query_as(
        "SELECT id, path FROM folders WHERE project_id = ? AND substr(path, 1, ?) = ?",
    )
    .bind(folder.project_id.to_string())
    .bind(descendant_prefix.chars().count() as i64)
    .bind(&descendant_prefix)
    .fetch_all(&mut *tx)
    .await?;

    for (descendant_id, path) in &descendants {
        let Some(rebased) = rebase_path(path, &old_path, &new_path) else {
            continue;
        };
        sqlx::query("UPDATE folders SET path = ?, updated_at = ? WHERE id = ?")
            .bind(&rebased)
            .bind(fmt_time(timestamp))
            .bind(descendant_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::from_unique_violation(e, already_exists(&name)))?;
    }

    tx.commit().await?;

    debug!(
        folder_id = %folder.id,
        from = %old_path,
        to = %new_path,
        descendants = descendants.len(),
        "Folder path rewritten"
    );

    folder.name = name;
    folder.parent_id = parent_id;
    folder.path = new_path;
    folder.updated_at = timestamp;
    touch_project(pool, folder.project_id).await?;
    Ok(folder)
}

/// Delete a folder and its subtree; contained assets become unfiled
pub async fn delete_folder(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<()> {
    let folder = get_folder(pool, user_id, id).await?;
    // Child folders cascade through parent_id; assets.folder_id is SET NULL
    sqlx::query("DELETE FROM folders WHERE id = ?")
        .bind(folder.id.to_string())
        .execute(pool)
        .await?;
    touch_project(pool, folder.project_id).await?;
    Ok(())
}

/// Check that `folder_id` is owned by the user and lives in `project_id`
pub async fn ensure_folder_in_project(
    pool: &SqlitePool,
    user_id: &str,
    folder_id: Uuid,
    project_id: Uuid,
) -> Result<()> {
    let folder = get_folder(pool, user_id, folder_id).await?;
    if folder.project_id != project_id {
        return Err(Error::InvalidInput(format!(
            "folder {} does not belong to project {}",
            folder_id, project_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;

    fn rename(name: &str) -> UpdateFolderRequest {
        UpdateFolderRequest {
            name: Some(name.to_string()),
            parent_id: None,
        }
    }

    fn move_to(parent: Option<Uuid>) -> UpdateFolderRequest {
        UpdateFolderRequest {
            name: None,
            parent_id: Some(parent),
        }
    }

    async fn paths(pool: &SqlitePool, project_id: Uuid) -> Vec<String> {
        list_folders(pool, "u", project_id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect()
    }

    #[tokio::test]
    async fn test_paths_follow_parents() {
        let pool = fixtures::pool().await;
        let p = fixtures::project(&pool, "u", "P").await;
        let a = fixtures::folder(&pool, "u", p.id, None, "a").await;
        let b = fixtures::folder(&pool, "u", p.id, Some(a.id), "b").await;
        let c = fixtures::folder(&pool, "u", p.id, Some(b.id), "c").await;

        assert_eq!(a.path, "/a");
        assert_eq!(b.path, "/a/b");
        assert_eq!(c.path, "/a/b/c");
    }

    #[tokio::test]
    async fn test_sibling_names_unique() {
        let pool = fixtures::pool().await;
        let p = fixtures::project(&pool, "u", "P").await;
        let a = fixtures::folder(&pool, "u", p.id, None, "a").await;
        fixtures::folder(&pool, "u", p.id, Some(a.id), "x").await;

        let err = create_folder(&pool, "u", p.id, Some(a.id), "x").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(ref m) if m.contains("'x' already exists here")));

        // Same name at a different level is fine
        create_folder(&pool, "u", p.id, None, "x").await.unwrap();
    }

    #[tokio::test]
    async fn test_parent_must_be_in_same_project() {
        let pool = fixtures::pool().await;
        let p1 = fixtures::project(&pool, "u", "P1").await;
        let p2 = fixtures::project(&pool, "u", "P2").await;
        let a = fixtures::folder(&pool, "u", p1.id, None, "a").await;

        let err = create_folder(&pool, "u", p2.id, Some(a.id), "b").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_rename_rewrites_descendants() {
        let pool = fixtures::pool().await;
        let p = fixtures::project(&pool, "u", "P").await;
        let a = fixtures::folder(&pool, "u", p.id, None, "a").await;
        let b = fixtures::folder(&pool, "u", p.id, Some(a.id), "b").await;
        fixtures::folder(&pool, "u", p.id, Some(b.id), "c").await;
        // Shares the "/a" string prefix but is not below /a
        fixtures::folder(&pool, "u", p.id, None, "ab").await;

        let renamed = update_folder(&pool, "u", a.id, rename("z")).await.unwrap();
        assert_eq!(renamed.path, "/z");

        assert_eq!(paths(&pool, p.id).await, vec!["/ab", "/z", "/z/b", "/z/b/c"]);
    }

    #[tokio::test]
    async fn test_move_subtree_and_back_to_root() {
        let pool = fixtures::pool().await;
        let p = fixtures::project(&pool, "u", "P").await;
        let a = fixtures::folder(&pool, "u", p.id, None, "a").await;
        let b = fixtures::folder(&pool, "u", p.id, None, "b").await;
        fixtures::folder(&pool, "u", p.id, Some(b.id), "c").await;

        let moved = update_folder(&pool, "u", b.id, move_to(Some(a.id))).await.unwrap();
        assert_eq!(moved.path, "/a/b");
        assert_eq!(moved.parent_id, Some(a.id));
        assert_eq!(paths(&pool, p.id).await, vec!["/a", "/a/b", "/a/b/c"]);

        let back = update_folder(&pool, "u", b.id, move_to(None)).await.unwrap();
        assert_eq!(back.path, "/b");
        assert_eq!(back.parent_id, None);
        assert_eq!(paths(&pool, p.id).await, vec!["/a", "/b", "/b/c"]);
    }

    #[tokio::test]
    async fn test_move_into_own_subtree_rejected() {
        let pool = fixtures::pool().await;
        let p = fixtures::project(&pool, "u", "P").await;
        let a = fixtures::folder(&pool, "u", p.id, None, "a").await;
        let b = fixtures::folder(&pool, "u", p.id, Some(a.id), "b").await;

        assert!(matches!(
            update_folder(&pool, "u", a.id, move_to(Some(b.id))).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            update_folder(&pool, "u", a.id, move_to(Some(a.id))).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_onto_sibling_conflicts_and_rolls_back() {
        let pool = fixtures::pool().await;
        let p = fixtures::project(&pool, "u", "P").await;
        let a = fixtures::folder(&pool, "u", p.id, None, "a").await;
        fixtures::folder(&pool, "u", p.id, Some(a.id), "child").await;
        fixtures::folder(&pool, "u", p.id, None, "b").await;

        let err = update_folder(&pool, "u", a.id, rename("b")).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(paths(&pool, p.id).await, vec!["/a", "/a/child", "/b"]);
    }

    #[tokio::test]
    async fn test_cross_project_move_rejected() {
        let pool = fixtures::pool().await;
        let p1 = fixtures::project(&pool, "u", "P1").await;
        let p2 = fixtures::project(&pool, "u", "P2").await;
        let a = fixtures::folder(&pool, "u", p1.id, None, "a").await;
        let other = fixtures::folder(&pool, "u", p2.id, None, "other").await;

        assert!(matches!(
            update_folder(&pool, "u", a.id, move_to(Some(other.id))).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_subtree() {
        let pool = fixtures::pool().await;
        let p = fixtures::project(&pool, "u", "P").await;
        let a = fixtures::folder(&pool, "u", p.id, None, "a").await;
        let b = fixtures::folder(&pool, "u", p.id, Some(a.id), "b").await;
        fixtures::folder(&pool, "u", p.id, Some(b.id), "c").await;
        fixtures::folder(&pool, "u", p.id, None, "keep").await;

        delete_folder(&pool, "u", a.id).await.unwrap();
        assert_eq!(paths(&pool, p.id).await, vec!["/keep"]);
    }

    #[tokio::test]
    async fn test_other_user_cannot_see_folder() {
        let pool = fixtures::pool().await;
        let p = fixtures::project(&pool, "u", "P").await;
        let a = fixtures::folder(&pool, "u", p.id, None, "a").await;

        assert!(matches!(get_folder(&pool, "v", a.id).await, Err(Error::NotFound(_))));
        assert!(matches!(list_folders(&pool, "v", p.id).await, Err(Error::NotFound(_))));
    }
}
