//! Turn a finished generation's output URLs into stored assets

use anyhow::Context;
use bb_common::events::{BlenderEvent, EventBus};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::models::asset::extension_for_mime;
use crate::models::{AssetKind, GenerationJob, GenerationKind, NewAsset};
use crate::providers::GenerationProvider;
use crate::storage::{detect_mime, object_key, AssetStorage};

/// Title of output `index` (0-based) out of `count`
///
/// ```
/// use bb_server::services::output_ingest::output_title;
///
/// assert_eq!(output_title("Dusk", 0, 1), "Dusk");
/// assert_eq!(output_title("Dusk", 1, 3), "Dusk #2");
/// ```
pub fn output_title(base: &str, index: usize, count: usize) -> String {
    if count > 1 {
        format!("{} #{}", base, index + 1)
    } else {
        base.to_string()
    }
}

fn base_title(job: &GenerationJob) -> String {
    if let Some(title) = &job.title {
        return title.clone();
    }
    match &job.prompt {
        Some(prompt) => {
            let short: String = prompt.chars().take(60).collect();
            if short.len() < prompt.len() {
                format!("{}...", short.trim_end())
            } else {
                short
            }
        }
        None => format!("{} {}", job.provider, job.kind),
    }
}

fn asset_kind(kind: GenerationKind) -> AssetKind {
    match kind {
        GenerationKind::Image => AssetKind::Image,
        GenerationKind::Video | GenerationKind::Lipsync => AssetKind::Video,
    }
}

/// Download every output, store it and create its asset row
///
/// Returns the new asset ids in output order. Experiment and comparison
/// links are best effort: a container deleted mid-generation is skipped.
pub async fn ingest_outputs(
    pool: &SqlitePool,
    storage: &AssetStorage,
    event_bus: &EventBus,
    provider: &dyn GenerationProvider,
    job: &GenerationJob,
    outputs: &[String],
    max_download_bytes: u64,
) -> anyhow::Result<Vec<Uuid>> {
    let base = base_title(job);
    let kind = asset_kind(job.kind);
    let mut asset_ids = Vec::with_capacity(outputs.len());

    let stored: anyhow::Result<()> = async {
        for (index, url) in outputs.iter().enumerate() {
            let bytes = provider
                .download_output(url, max_download_bytes)
                .await
                .with_context(|| format!("downloading output {}", index + 1))?;

            let mime_type = detect_mime(&bytes, None);
            let asset_id = Uuid::new_v4();
            let file_name = format!("output-{}.{}", index + 1, extension_for_mime(&mime_type));
            let storage_key = object_key(&job.user_id, asset_id, &file_name);
            let size_bytes = bytes.len() as i64;

            storage
                .put(&storage_key, bytes)
                .await
                .with_context(|| format!("storing output {}", index + 1))?;

            let inserted = db::assets::insert_asset(
                pool,
                NewAsset {
                    id: asset_id,
                    user_id: job.user_id.clone(),
                    project_id: job.project_id,
                    folder_id: job.folder_id,
                    kind,
                    title: output_title(&base, index, outputs.len()),
                    storage_key: storage_key.clone(),
                    mime_type,
                    size_bytes,
                    provider: Some(job.provider.to_string()),
                    model: job.model.clone(),
                    prompt: job.prompt.clone(),
                    parameters: job.parameters.clone(),
                    generation_id: Some(job.id),
                    tags: Vec::new(),
                },
            )
            .await;

            if let Err(e) = inserted {
                if let Err(cleanup) = storage.delete(&storage_key).await {
                    warn!(key = %storage_key, "Failed to remove orphaned object: {}", cleanup);
                }
                return Err(e).context("inserting output asset");
            }

            event_bus.emit_lossy(BlenderEvent::AssetCreated {
                asset_id,
                user_id: job.user_id.clone(),
                kind: kind.as_str().to_string(),
                timestamp: Utc::now(),
            });
            asset_ids.push(asset_id);
        }
        Ok(())
    }
    .await;

    // A failed job keeps no partial outputs
    if let Err(e) = stored {
        discard_assets(pool, storage, event_bus, &job.user_id, &asset_ids).await;
        return Err(e);
    }

    if let Some(experiment_id) = job.experiment_id {
        for asset_id in &asset_ids {
            if let Err(e) =
                db::experiments::add_experiment_asset(pool, &job.user_id, experiment_id, *asset_id, None).await
            {
                warn!(generation_id = %job.id, %experiment_id, "Could not link output to experiment: {}", e);
                break;
            }
        }
    }

    if let (Some(comparison_id), Some(first)) = (job.comparison_id, asset_ids.first()) {
        match db::comparisons::set_entry_asset_for_generation(pool, comparison_id, job.id, *first).await {
            Ok(true) => {}
            Ok(false) => warn!(generation_id = %job.id, %comparison_id, "No comparison entry for generation"),
            Err(e) => warn!(generation_id = %job.id, %comparison_id, "Could not update comparison entry: {}", e),
        }
    }

    info!(generation_id = %job.id, assets = asset_ids.len(), "Generation outputs stored");
    Ok(asset_ids)
}

/// Remove assets of a generation that failed midway or lost its race to cancellation
pub async fn discard_assets(
    pool: &SqlitePool,
    storage: &AssetStorage,
    event_bus: &EventBus,
    user_id: &str,
    asset_ids: &[Uuid],
) {
    for asset_id in asset_ids {
        match db::assets::delete_asset(pool, user_id, *asset_id).await {
            Ok(asset) => {
                if let Err(e) = storage.delete(&asset.storage_key).await {
                    warn!(%asset_id, "Failed to delete object: {}", e);
                }
                event_bus.emit_lossy(BlenderEvent::AssetDeleted {
                    asset_id: *asset_id,
                    user_id: user_id.to_string(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => warn!(%asset_id, "Failed to discard asset: {}", e),
        }
    }
}
