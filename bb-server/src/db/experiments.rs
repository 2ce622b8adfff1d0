//! Experiment persistence and asset links

use bb_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::assets::{asset_from_row, get_asset};
use super::projects::ensure_project_owned;
use super::{fmt_time, now, parse_opt_time, parse_opt_uuid, parse_time, parse_uuid};
use crate::models::experiment::MAX_NOTES_LEN;
use crate::models::{
    optional_text, CreateExperimentRequest, Experiment, ExperimentAsset, ExperimentDetail,
    UpdateExperimentRequest,
};

fn experiment_from_row(row: &SqliteRow) -> Result<Experiment> {
    Ok(Experiment {
        id: parse_uuid(&row.get::<String, _>("id"), "experiments.id")?,
        user_id: row.get("user_id"),
        project_id: parse_opt_uuid(row.get("project_id"), "experiments.project_id")?,
        name: row.get("name"),
        hypothesis: row.get("hypothesis"),
        notes: row.get("notes"),
        status: row.get::<String, _>("status").parse()?,
        concluded_at: parse_opt_time(row.get("concluded_at"), "experiments.concluded_at")?,
        created_at: parse_time(&row.get::<String, _>("created_at"), "experiments.created_at")?,
        updated_at: parse_time(&row.get::<String, _>("updated_at"), "experiments.updated_at")?,
    })
}

pub async fn create_experiment(
    pool: &SqlitePool,
    user_id: &str,
    mut request: CreateExperimentRequest,
) -> Result<Experiment> {
    request.validate()?;
    if let Some(project_id) = request.project_id {
        ensure_project_owned(pool, user_id, project_id).await?;
    }

    let timestamp = now();
    let mut experiment = Experiment {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        project_id: request.project_id,
        name: request.name,
        hypothesis: request.hypothesis,
        notes: request.notes,
        status: Default::default(),
        concluded_at: None,
        created_at: timestamp,
        updated_at: timestamp,
    };
    if let Some(status) = request.status {
        experiment.set_status(status, timestamp);
    }

    sqlx::query(
        r#"
        INSERT INTO experiments (
            id, user_id, project_id, name, hypothesis, notes, status, concluded_at,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(experiment.id.to_string())
    .bind(&experiment.user_id)
    .bind(experiment.project_id.map(|id| id.to_string()))
    .bind(&experiment.name)
    .bind(&experiment.hypothesis)
    .bind(&experiment.notes)
    .bind(experiment.status.as_str())
    .bind(experiment.concluded_at.map(fmt_time))
    .bind(fmt_time(experiment.created_at))
    .bind(fmt_time(experiment.updated_at))
    .execute(pool)
    .await?;

    Ok(experiment)
}

pub async fn get_experiment(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<Experiment> {
    let row = sqlx::query("SELECT * FROM experiments WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("experiment {}", id)))?;
    experiment_from_row(&row)
}

/// Experiment with its linked assets, oldest link first
pub async fn get_experiment_detail(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<ExperimentDetail> {
    let experiment = get_experiment(pool, user_id, id).await?;

    let rows = sqlx::query(
        r#"
        SELECT a.*, ea.note AS link_note, ea.added_at AS link_added_at
        FROM experiment_assets ea
        JOIN assets a ON a.id = ea.asset_id
        WHERE ea.experiment_id = ?
        ORDER BY ea.added_at, a.id
        "#,
    )
    .bind(id.to_string())
    .fetch_all(pool)
    .await?;

    let assets = rows
        .iter()
        .map(|row| {
            Ok(ExperimentAsset {
                asset: asset_from_row(row)?,
                note: row.get("link_note"),
                added_at: parse_time(&row.get::<String, _>("link_added_at"), "experiment_assets.added_at")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ExperimentDetail { experiment, assets })
}

pub async fn count_experiments(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM experiments WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?)
}

pub async fn list_experiments(pool: &SqlitePool, user_id: &str, limit: i64, offset: i64) -> Result<Vec<Experiment>> {
    let rows = sqlx::query(
        "SELECT * FROM experiments WHERE user_id = ? ORDER BY updated_at DESC, id LIMIT ? OFFSET ?",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    rows.iter().map(experiment_from_row).collect()
}

pub async fn update_experiment(
    pool: &SqlitePool,
    user_id: &str,
    id: Uuid,
    patch: UpdateExperimentRequest,
) -> Result<Experiment> {
    let mut experiment = get_experiment(pool, user_id, id).await?;
    let timestamp = now();
    experiment.apply(patch, timestamp)?;
    if let Some(project_id) = experiment.project_id {
        ensure_project_owned(pool, user_id, project_id).await?;
    }
    experiment.updated_at = timestamp;

    sqlx::query(
        r#"
        UPDATE experiments
        SET project_id = ?, name = ?, hypothesis = ?, notes = ?, status = ?, concluded_at = ?,
            updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(experiment.project_id.map(|id| id.to_string()))
    .bind(&experiment.name)
    .bind(&experiment.hypothesis)
    .bind(&experiment.notes)
    .bind(experiment.status.as_str())
    .bind(experiment.concluded_at.map(fmt_time))
    .bind(fmt_time(experiment.updated_at))
    .bind(experiment.id.to_string())
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(experiment)
}

pub async fn delete_experiment(pool: &SqlitePool, user_id: &str, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM experiments WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("experiment {}", id)));
    }
    Ok(())
}

/// Link an asset; linking it again replaces the note
pub async fn add_experiment_asset(
    pool: &SqlitePool,
    user_id: &str,
    experiment_id: Uuid,
    asset_id: Uuid,
    note: Option<String>,
) -> Result<()> {
    get_experiment(pool, user_id, experiment_id).await?;
    get_asset(pool, user_id, asset_id).await?;
    let note = optional_text(note, "note", MAX_NOTES_LEN)?;

    sqlx::query(
        r#"
        INSERT INTO experiment_assets (experiment_id, asset_id, note, added_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (experiment_id, asset_id) DO UPDATE SET note = excluded.note
        "#,
    )
    .bind(experiment_id.to_string())
    .bind(asset_id.to_string())
    .bind(&note)
    .bind(fmt_time(now()))
    .execute(pool)
    .await?;

    touch_experiment(pool, experiment_id).await
}

pub async fn remove_experiment_asset(
    pool: &SqlitePool,
    user_id: &str,
    experiment_id: Uuid,
    asset_id: Uuid,
) -> Result<()> {
    get_experiment(pool, user_id, experiment_id).await?;
    let result = sqlx::query("DELETE FROM experiment_assets WHERE experiment_id = ? AND asset_id = ?")
        .bind(experiment_id.to_string())
        .bind(asset_id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "asset {} is not linked to experiment {}",
            asset_id, experiment_id
        )));
    }
    touch_experiment(pool, experiment_id).await
}

async fn touch_experiment(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE experiments SET updated_at = ? WHERE id = ?")
        .bind(fmt_time(now()))
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::assets::insert_asset;
    use crate::db::fixtures;
    use crate::models::{AssetKind, ExperimentStatus, NewAsset};
    use serde_json::json;

    fn request(name: &str) -> CreateExperimentRequest {
        CreateExperimentRequest {
            name: name.to_string(),
            hypothesis: Some("Warmer light reads as friendlier".into()),
            notes: None,
            status: None,
            project_id: None,
        }
    }

    async fn asset(pool: &SqlitePool, user: &str) -> Uuid {
        let id = Uuid::new_v4();
        insert_asset(
            pool,
            NewAsset {
                id,
                user_id: user.to_string(),
                project_id: None,
                folder_id: None,
                kind: AssetKind::Image,
                title: "a".into(),
                storage_key: format!("k/{}", id),
                mime_type: "image/png".into(),
                size_bytes: 1,
                provider: None,
                model: None,
                prompt: None,
                parameters: json!({}),
                generation_id: None,
                tags: vec![],
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_create_defaults_to_planned() {
        let pool = fixtures::pool().await;
        let experiment = create_experiment(&pool, "u", request("Lighting")).await.unwrap();
        assert_eq!(experiment.status, ExperimentStatus::Planned);
        assert_eq!(experiment.concluded_at, None);
        assert_eq!(get_experiment(&pool, "u", experiment.id).await.unwrap(), experiment);
    }

    #[tokio::test]
    async fn test_status_transitions_persist() {
        let pool = fixtures::pool().await;
        let experiment = create_experiment(&pool, "u", request("Lighting")).await.unwrap();

        let completed = update_experiment(
            &pool,
            "u",
            experiment.id,
            UpdateExperimentRequest {
                status: Some(ExperimentStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(completed.concluded_at.is_some());
        assert_eq!(get_experiment(&pool, "u", experiment.id).await.unwrap(), completed);

        let reopened = update_experiment(
            &pool,
            "u",
            experiment.id,
            UpdateExperimentRequest {
                status: Some(ExperimentStatus::Running),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(reopened.concluded_at, None);
    }

    #[tokio::test]
    async fn test_asset_links() {
        let pool = fixtures::pool().await;
        let experiment = create_experiment(&pool, "u", request("Lighting")).await.unwrap();
        let a = asset(&pool, "u").await;
        let b = asset(&pool, "u").await;

        add_experiment_asset(&pool, "u", experiment.id, a, Some("baseline".into())).await.unwrap();
        add_experiment_asset(&pool, "u", experiment.id, b, None).await.unwrap();
        add_experiment_asset(&pool, "u", experiment.id, a, Some("control".into())).await.unwrap();

        let detail = get_experiment_detail(&pool, "u", experiment.id).await.unwrap();
        assert_eq!(detail.assets.len(), 2);
        let linked_a = detail.assets.iter().find(|l| l.asset.id == a).unwrap();
        assert_eq!(linked_a.note.as_deref(), Some("control"));

        remove_experiment_asset(&pool, "u", experiment.id, b).await.unwrap();
        assert!(matches!(
            remove_experiment_asset(&pool, "u", experiment.id, b).await,
            Err(Error::NotFound(_))
        ));
        let detail = get_experiment_detail(&pool, "u", experiment.id).await.unwrap();
        assert_eq!(detail.assets.len(), 1);
    }

    #[tokio::test]
    async fn test_cannot_link_foreign_asset() {
        let pool = fixtures::pool().await;
        let experiment = create_experiment(&pool, "u", request("Lighting")).await.unwrap();
        let theirs = asset(&pool, "v").await;

        assert!(matches!(
            add_experiment_asset(&pool, "u", experiment.id, theirs, None).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_asset_drops_link() {
        let pool = fixtures::pool().await;
        let experiment = create_experiment(&pool, "u", request("Lighting")).await.unwrap();
        let a = asset(&pool, "u").await;
        add_experiment_asset(&pool, "u", experiment.id, a, None).await.unwrap();

        crate::db::assets::delete_asset(&pool, "u", a).await.unwrap();
        let detail = get_experiment_detail(&pool, "u", experiment.id).await.unwrap();
        assert!(detail.assets.is_empty());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let pool = fixtures::pool().await;
        let experiment = create_experiment(&pool, "u", request("One")).await.unwrap();
        create_experiment(&pool, "v", request("Theirs")).await.unwrap();

        assert_eq!(count_experiments(&pool, "u").await.unwrap(), 1);
        assert_eq!(list_experiments(&pool, "u", 50, 0).await.unwrap().len(), 1);

        delete_experiment(&pool, "u", experiment.id).await.unwrap();
        assert_eq!(count_experiments(&pool, "u").await.unwrap(), 0);
    }
}
