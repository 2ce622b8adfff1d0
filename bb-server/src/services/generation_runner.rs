//! Generation lifecycle: submit, track, cancel, resume
//!
//! Every pending job has one tracking task that polls its provider. The
//! task's [`CancellationToken`] lives in `cancellation_tokens` for as long
//! as the task runs, so a cancel request can reach it.

use bb_common::events::{BlenderEvent, EventBus};
use bb_common::Result as CommonResult;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::output_ingest::{discard_assets, ingest_outputs};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    CreateGenerationRequest, GenerationJob, JobStatus, RunComparisonRequest,
};
use crate::providers::{
    poll_until_complete, GenerationProvider, PollConfig, PollError, ProviderJobRequest,
    ProviderRegistry,
};
use crate::storage::AssetStorage;

/// Owns the background tracking of generation jobs
#[derive(Clone)]
pub struct GenerationRunner {
    db: SqlitePool,
    storage: AssetStorage,
    providers: ProviderRegistry,
    event_bus: EventBus,
    poll_config: PollConfig,
    max_download_bytes: u64,
    cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
}

impl GenerationRunner {
    pub fn new(
        db: SqlitePool,
        storage: AssetStorage,
        providers: ProviderRegistry,
        event_bus: EventBus,
        poll_config: PollConfig,
        max_download_bytes: u64,
    ) -> Self {
        Self {
            db,
            storage,
            providers,
            event_bus,
            poll_config,
            max_download_bytes,
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll_config
    }

    /// Number of tracking tasks currently running
    pub async fn active_jobs(&self) -> usize {
        self.cancellation_tokens.read().await.len()
    }

    /// Validate, submit to the provider, persist and start tracking
    pub async fn submit(&self, user_id: &str, mut request: CreateGenerationRequest) -> ApiResult<GenerationJob> {
        request.validate()?;

        let provider = self.providers.get(request.provider).ok_or_else(|| {
            ApiError::BadRequest(format!("provider '{}' is not configured", request.provider))
        })?;

        db::assets::validate_placement(&self.db, user_id, request.project_id, request.folder_id).await?;
        if let Some(experiment_id) = request.experiment_id {
            db::experiments::get_experiment(&self.db, user_id, experiment_id).await?;
        }
        if let Some(comparison_id) = request.comparison_id {
            db::comparisons::get_comparison(&self.db, user_id, comparison_id).await?;
        }

        let provider_request = ProviderJobRequest {
            kind: request.kind,
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            parameters: request.parameters.clone(),
            inputs: request.inputs.clone(),
        };
        let provider_job_id = provider.submit(&provider_request).await?;

        let job = GenerationJob {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            provider: request.provider,
            kind: request.kind,
            model: request.model,
            prompt: request.prompt,
            negative_prompt: request.negative_prompt,
            parameters: request.parameters,
            inputs: request.inputs,
            provider_job_id,
            status: JobStatus::Pending,
            error: None,
            output_urls: Vec::new(),
            asset_ids: Vec::new(),
            project_id: request.project_id,
            folder_id: request.folder_id,
            experiment_id: request.experiment_id,
            comparison_id: request.comparison_id,
            title: request.title,
            attempts: 0,
            created_at: db::now(),
            completed_at: None,
        };

        if let Err(e) = db::generations::insert_generation(&self.db, &job).await {
            // Nothing will track the upstream job, so stop it
            if let Err(cancel_err) = provider.cancel(&job.provider_job_id).await {
                warn!(provider_job_id = %job.provider_job_id, "Failed to cancel untracked job: {}", cancel_err);
            }
            return Err(e.into());
        }

        info!(
            generation_id = %job.id,
            provider = %job.provider,
            kind = %job.kind,
            provider_job_id = %job.provider_job_id,
            "Generation submitted"
        );
        self.event_bus.emit_lossy(BlenderEvent::GenerationSubmitted {
            generation_id: job.id,
            user_id: job.user_id.clone(),
            provider: job.provider.to_string(),
            provider_job_id: job.provider_job_id.clone(),
            timestamp: Utc::now(),
        });

        // The entry must point at the job before tracking can complete it
        if let (Some(comparison_id), Some(model)) = (job.comparison_id, job.model.as_deref()) {
            if let Err(e) = db::comparisons::set_entry_generation(&self.db, comparison_id, model, job.id).await {
                warn!(generation_id = %job.id, %comparison_id, "Could not link comparison entry: {}", e);
            }
        }

        self.spawn_tracking(job.clone(), provider).await;
        Ok(job)
    }

    /// Submit one generation per model of a comparison
    pub async fn run_comparison(
        &self,
        user_id: &str,
        comparison_id: Uuid,
        request: RunComparisonRequest,
    ) -> ApiResult<Vec<GenerationJob>> {
        let comparison = db::comparisons::get_comparison(&self.db, user_id, comparison_id).await?;
        let kind = request.kind_for(comparison.provider)?;
        let parameters = request
            .parameters
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));

        let mut jobs = Vec::with_capacity(comparison.entries.len());
        for entry in &comparison.entries {
            let generation = CreateGenerationRequest {
                provider: comparison.provider,
                kind,
                model: Some(entry.model.clone()),
                prompt: Some(comparison.prompt.clone()),
                negative_prompt: None,
                parameters: parameters.clone(),
                inputs: request.inputs.clone(),
                project_id: comparison.project_id,
                folder_id: request.folder_id,
                experiment_id: None,
                title: Some(format!("{} ({})", comparison.name, entry.model)),
                comparison_id: Some(comparison.id),
            };
            jobs.push(self.submit(user_id, generation).await?);
        }

        info!(%comparison_id, jobs = jobs.len(), "Comparison run submitted");
        Ok(jobs)
    }

    /// Cancel a pending generation
    pub async fn cancel(&self, user_id: &str, id: Uuid) -> ApiResult<GenerationJob> {
        let job = db::generations::get_generation(&self.db, user_id, id).await?;
        if job.status != JobStatus::Pending {
            return Err(ApiError::BadRequest(format!(
                "generation is already {}",
                job.status.as_str()
            )));
        }

        let token = self.cancellation_tokens.read().await.get(&id).cloned();

        if db::generations::mark_cancelled(&self.db, id).await? {
            info!(generation_id = %id, tracked = token.is_some(), "Generation cancelled");
            self.emit_cancelled(&job);
        }
        // The tracking task asks the provider to stop
        if let Some(token) = token {
            token.cancel();
        }

        let job = db::generations::get_generation(&self.db, user_id, id).await?;
        if job.status != JobStatus::Cancelled {
            return Err(ApiError::BadRequest(format!(
                "generation is already {}",
                job.status.as_str()
            )));
        }
        Ok(job)
    }

    /// Resume tracking of jobs left pending by a previous run
    ///
    /// Jobs whose provider is no longer configured are failed.
    pub async fn resume_pending_jobs(&self) -> CommonResult<usize> {
        let pending = db::generations::list_pending_generations(&self.db).await?;
        let mut resumed = 0;

        for job in pending {
            match self.providers.get(job.provider) {
                Some(provider) => {
                    debug!(generation_id = %job.id, provider = %job.provider, "Resuming generation tracking");
                    self.spawn_tracking(job, provider).await;
                    resumed += 1;
                }
                None => {
                    let reason = format!("provider '{}' is no longer configured", job.provider);
                    warn!(generation_id = %job.id, "{}", reason);
                    self.fail(&job, &reason).await;
                }
            }
        }

        if resumed > 0 {
            info!("Resumed tracking of {} pending generation(s)", resumed);
        }
        Ok(resumed)
    }

    async fn spawn_tracking(&self, job: GenerationJob, provider: Arc<dyn GenerationProvider>) {
        let token = CancellationToken::new();
        self.cancellation_tokens.write().await.insert(job.id, token.clone());

        let runner = self.clone();
        tokio::spawn(async move {
            let generation_id = job.id;
            runner.track(job, provider, token).await;
            runner.cancellation_tokens.write().await.remove(&generation_id);
            debug!(%generation_id, "Tracking task finished");
        });
    }

    async fn track(&self, job: GenerationJob, provider: Arc<dyn GenerationProvider>, token: CancellationToken) {
        let max_attempts = self.poll_config.max_attempts;
        let on_pending = |attempt: u32, detail: String| {
            let db = self.db.clone();
            let event_bus = self.event_bus.clone();
            let generation_id = job.id;
            let user_id = job.user_id.clone();
            async move {
                if let Err(e) = db::generations::update_attempts(&db, generation_id, attempt).await {
                    warn!(%generation_id, "Failed to record poll attempt: {}", e);
                }
                event_bus.emit_lossy(BlenderEvent::GenerationProgress {
                    generation_id,
                    user_id,
                    attempt,
                    max_attempts,
                    detail,
                    timestamp: Utc::now(),
                });
            }
        };

        let result = poll_until_complete(
            provider.as_ref(),
            &job.provider_job_id,
            self.poll_config,
            &token,
            on_pending,
        )
        .await;

        match result {
            Ok(outputs) => self.complete(&job, provider.as_ref(), outputs).await,
            Err(PollError::Cancelled) => {
                if let Err(e) = provider.cancel(&job.provider_job_id).await {
                    warn!(generation_id = %job.id, "Provider cancel failed: {}", e);
                }
                match db::generations::mark_cancelled(&self.db, job.id).await {
                    Ok(true) => self.emit_cancelled(&job),
                    Ok(false) => {}
                    Err(e) => error!(generation_id = %job.id, "Failed to mark generation cancelled: {}", e),
                }
            }
            Err(e) => self.fail(&job, &e.to_string()).await,
        }
    }

    async fn complete(&self, job: &GenerationJob, provider: &dyn GenerationProvider, outputs: Vec<String>) {
        // Containers may have been deleted while the provider worked
        let job = match db::generations::get_generation(&self.db, &job.user_id, job.id).await {
            Ok(current) if current.status == JobStatus::Pending => current,
            Ok(_) => return,
            Err(e) => {
                error!(generation_id = %job.id, "Failed to reload generation: {}", e);
                return;
            }
        };

        let asset_ids = match ingest_outputs(
            &self.db,
            &self.storage,
            &self.event_bus,
            provider,
            &job,
            &outputs,
            self.max_download_bytes,
        )
        .await
        {
            Ok(ids) => ids,
            Err(e) => {
                self.fail(&job, &format!("failed to store outputs: {:#}", e)).await;
                return;
            }
        };

        match db::generations::mark_succeeded(&self.db, job.id, &outputs, &asset_ids).await {
            Ok(true) => {
                info!(generation_id = %job.id, assets = asset_ids.len(), "Generation completed");
                self.event_bus.emit_lossy(BlenderEvent::GenerationCompleted {
                    generation_id: job.id,
                    user_id: job.user_id.clone(),
                    asset_ids,
                    timestamp: Utc::now(),
                });
            }
            Ok(false) => {
                debug!(generation_id = %job.id, "Generation finished after cancellation; discarding outputs");
                discard_assets(&self.db, &self.storage, &self.event_bus, &job.user_id, &asset_ids).await;
            }
            Err(e) => error!(generation_id = %job.id, "Failed to mark generation succeeded: {}", e),
        }
    }

    async fn fail(&self, job: &GenerationJob, reason: &str) {
        match db::generations::mark_failed(&self.db, job.id, reason).await {
            Ok(true) => {
                warn!(generation_id = %job.id, provider = %job.provider, "Generation failed: {}", reason);
                self.event_bus.emit_lossy(BlenderEvent::GenerationFailed {
                    generation_id: job.id,
                    user_id: job.user_id.clone(),
                    error: reason.to_string(),
                    timestamp: Utc::now(),
                });
            }
            Ok(false) => {}
            Err(e) => error!(generation_id = %job.id, "Failed to mark generation failed: {}", e),
        }
    }

    fn emit_cancelled(&self, job: &GenerationJob) {
        self.event_bus.emit_lossy(BlenderEvent::GenerationCancelled {
            generation_id: job.id,
            user_id: job.user_id.clone(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::models::{GenerationKind, ProviderKind};
    use crate::providers::poll::scripted::ScriptedProvider;
    use crate::providers::{ProviderError, ProviderStatus};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::broadcast;

    fn runner_with(pool: SqlitePool, provider: Arc<ScriptedProvider>, max_attempts: u32) -> GenerationRunner {
        let mut registry = ProviderRegistry::new();
        registry.register(provider);
        GenerationRunner::new(
            pool,
            AssetStorage::in_memory(),
            registry,
            EventBus::new(64),
            PollConfig {
                interval: Duration::from_millis(1),
                max_attempts,
            },
            1024,
        )
    }

    fn image_request() -> CreateGenerationRequest {
        serde_json::from_value(serde_json::json!({
            "provider": "replicate",
            "kind": "image",
            "model": "black-forest-labs/flux-schnell",
            "prompt": "a lighthouse at dusk",
            "title": "Lighthouse"
        }))
        .unwrap()
    }

    async fn wait_for_terminal(rx: &mut broadcast::Receiver<BlenderEvent>) -> BlenderEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await.unwrap() {
                    event @ (BlenderEvent::GenerationCompleted { .. }
                    | BlenderEvent::GenerationFailed { .. }
                    | BlenderEvent::GenerationCancelled { .. }) => return event,
                    _ => continue,
                }
            }
        })
        .await
        .expect("no terminal event")
    }

    #[tokio::test]
    async fn test_submit_tracks_to_completion() {
        let pool = fixtures::pool().await;
        let provider = Arc::new(ScriptedProvider::new(
            ProviderKind::Replicate,
            vec![
                Ok(ProviderStatus::Pending { detail: "starting".into() }),
                Ok(ProviderStatus::Succeeded {
                    outputs: vec!["https://cdn/a.png".into(), "https://cdn/b.png".into()],
                }),
            ],
        ));
        let runner = runner_with(pool.clone(), provider, 10);
        let mut rx = runner.event_bus.subscribe();

        let job = runner.submit("u", image_request()).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.provider_job_id, "job-1");

        let event = wait_for_terminal(&mut rx).await;
        let BlenderEvent::GenerationCompleted { asset_ids, .. } = event else {
            panic!("unexpected {:?}", event);
        };
        assert_eq!(asset_ids.len(), 2);

        let stored = db::generations::get_generation(&pool, "u", job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Succeeded);
        assert_eq!(stored.asset_ids, asset_ids);
        assert_eq!(stored.attempts, 1);

        let first = db::assets::get_asset(&pool, "u", asset_ids[0]).await.unwrap();
        assert_eq!(first.title, "Lighthouse #1");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_rejected() {
        let pool = fixtures::pool().await;
        let provider = Arc::new(ScriptedProvider::pending_forever(ProviderKind::Runway));
        let runner = runner_with(pool, provider, 3);

        let err = runner.submit("u", image_request()).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m.contains("not configured")));
    }

    #[tokio::test]
    async fn test_foreign_project_rejected() {
        let pool = fixtures::pool().await;
        let theirs = fixtures::project(&pool, "v", "Theirs").await;
        let provider = Arc::new(ScriptedProvider::pending_forever(ProviderKind::Replicate));
        let runner = runner_with(pool, provider, 3);

        let mut request = image_request();
        request.project_id = Some(theirs.id);
        assert!(runner.submit("u", request).await.is_err());
    }

    #[tokio::test]
    async fn test_timeout_marks_failed() {
        let pool = fixtures::pool().await;
        let provider = Arc::new(ScriptedProvider::pending_forever(ProviderKind::Replicate));
        let runner = runner_with(pool.clone(), provider, 3);
        let mut rx = runner.event_bus.subscribe();

        let job = runner.submit("u", image_request()).await.unwrap();
        let event = wait_for_terminal(&mut rx).await;
        assert!(matches!(event, BlenderEvent::GenerationFailed { ref error, .. } if error.contains("timed out")));

        let stored = db::generations::get_generation(&pool, "u", job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.attempts, 3);
    }

    #[tokio::test]
    async fn test_provider_failure_marks_failed() {
        let pool = fixtures::pool().await;
        let provider = Arc::new(ScriptedProvider::new(
            ProviderKind::Replicate,
            vec![Ok(ProviderStatus::Failed { reason: "NSFW content detected".into() })],
        ));
        let runner = runner_with(pool.clone(), provider, 3);
        let mut rx = runner.event_bus.subscribe();

        let job = runner.submit("u", image_request()).await.unwrap();
        wait_for_terminal(&mut rx).await;

        let stored = db::generations::get_generation(&pool, "u", job.id).await.unwrap();
        assert_eq!(stored.error.as_deref(), Some("NSFW content detected"));
    }

    #[tokio::test]
    async fn test_cancel_stops_tracking() {
        let pool = fixtures::pool().await;
        let provider = Arc::new(ScriptedProvider::pending_forever(ProviderKind::Replicate));
        let runner = GenerationRunner {
            poll_config: PollConfig {
                interval: Duration::from_secs(3600),
                max_attempts: 5,
            },
            ..runner_with(pool.clone(), provider.clone(), 5)
        };

        let job = runner.submit("u", image_request()).await.unwrap();
        assert_eq!(runner.active_jobs().await, 1);

        let cancelled = runner.cancel("u", job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        tokio::time::timeout(Duration::from_secs(5), async {
            while runner.active_jobs().await > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(provider.cancel_calls.load(Ordering::SeqCst), 1);

        let err = runner.cancel("u", job.id).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_cancel_untracked_job() {
        let pool = fixtures::pool().await;
        let provider = Arc::new(ScriptedProvider::pending_forever(ProviderKind::Replicate));
        let runner = runner_with(pool.clone(), provider, 3);

        let job = crate::db::generations::test_support::pending_job("u", ProviderKind::Replicate, GenerationKind::Image);
        db::generations::insert_generation(&pool, &job).await.unwrap();

        let cancelled = runner.cancel("u", job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(matches!(runner.cancel("v", job.id).await, Err(ApiError::Common(_))));
    }

    #[tokio::test]
    async fn test_resume_pending_jobs() {
        let pool = fixtures::pool().await;
        let provider = Arc::new(ScriptedProvider::new(
            ProviderKind::Replicate,
            vec![Ok(ProviderStatus::Succeeded { outputs: vec!["https://cdn/a.png".into()] })],
        ));
        let runner = runner_with(pool.clone(), provider, 3);
        let mut rx = runner.event_bus.subscribe();

        let resumable = crate::db::generations::test_support::pending_job("u", ProviderKind::Replicate, GenerationKind::Image);
        let orphaned = crate::db::generations::test_support::pending_job("u", ProviderKind::Akool, GenerationKind::Lipsync);
        db::generations::insert_generation(&pool, &resumable).await.unwrap();
        db::generations::insert_generation(&pool, &orphaned).await.unwrap();

        assert_eq!(runner.resume_pending_jobs().await.unwrap(), 1);

        let orphaned = db::generations::get_generation(&pool, "u", orphaned.id).await.unwrap();
        assert_eq!(orphaned.status, JobStatus::Failed);
        assert!(orphaned.error.unwrap().contains("no longer configured"));

        loop {
            if let BlenderEvent::GenerationCompleted { generation_id, .. } = wait_for_terminal(&mut rx).await {
                assert_eq!(generation_id, resumable.id);
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_status_errors_then_timeout_report_last_error() {
        let pool = fixtures::pool().await;
        let provider = Arc::new(ScriptedProvider::new(
            ProviderKind::Replicate,
            vec![
                Err(ProviderError::Api { status: 500, message: "upstream".into() }),
                Err(ProviderError::Api { status: 500, message: "upstream".into() }),
            ],
        ));
        let runner = runner_with(pool.clone(), provider, 2);
        let mut rx = runner.event_bus.subscribe();

        runner.submit("u", image_request()).await.unwrap();
        let event = wait_for_terminal(&mut rx).await;
        assert!(matches!(event, BlenderEvent::GenerationFailed { ref error, .. } if error.contains("upstream")));
    }

    #[tokio::test]
    async fn test_run_comparison_links_entries() {
        let pool = fixtures::pool().await;
        let provider = Arc::new(ScriptedProvider::pending_forever(ProviderKind::Replicate));
        let runner = GenerationRunner {
            poll_config: PollConfig {
                interval: Duration::from_secs(3600),
                max_attempts: 1,
            },
            ..runner_with(pool.clone(), provider, 1)
        };

        let comparison = db::comparisons::create_comparison(
            &pool,
            "u",
            crate::models::CreateComparisonRequest {
                name: "Portraits".into(),
                prompt: "an astronaut".into(),
                provider: ProviderKind::Replicate,
                models: vec!["a/one".into(), "b/two".into()],
                project_id: None,
            },
        )
        .await
        .unwrap();

        let jobs = runner
            .run_comparison("u", comparison.id, RunComparisonRequest::default())
            .await
            .unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].model.as_deref(), Some("b/two"));
        assert_eq!(jobs[1].comparison_id, Some(comparison.id));
        assert_eq!(jobs[0].title.as_deref(), Some("Portraits (a/one)"));

        let loaded = db::comparisons::get_comparison(&pool, "u", comparison.id).await.unwrap();
        assert_eq!(loaded.entries[0].generation_id, Some(jobs[0].id));
        assert_eq!(loaded.entries[1].generation_id, Some(jobs[1].id));
    }

    #[tokio::test]
    async fn test_instant_success_fills_comparison_entry() {
        let pool = fixtures::pool().await;
        let provider = Arc::new(ScriptedProvider::new(
            ProviderKind::Replicate,
            vec![Ok(ProviderStatus::Succeeded {
                outputs: vec!["https://cdn/a.png".into()],
            })],
        ));
        let runner = GenerationRunner {
            poll_config: PollConfig {
                interval: Duration::ZERO,
                max_attempts: 1,
            },
            ..runner_with(pool.clone(), provider, 1)
        };
        let mut rx = runner.event_bus.subscribe();

        let comparison = db::comparisons::create_comparison(
            &pool,
            "u",
            crate::models::CreateComparisonRequest {
                name: "Portraits".into(),
                prompt: "an astronaut".into(),
                provider: ProviderKind::Replicate,
                models: vec!["a/one".into(), "b/two".into()],
                project_id: None,
            },
        )
        .await
        .unwrap();

        let mut request = image_request();
        request.model = Some("a/one".into());
        request.comparison_id = Some(comparison.id);
        let job = runner.submit("u", request).await.unwrap();

        let event = wait_for_terminal(&mut rx).await;
        let BlenderEvent::GenerationCompleted { asset_ids, .. } = event else {
            panic!("unexpected {:?}", event);
        };

        let loaded = db::comparisons::get_comparison(&pool, "u", comparison.id).await.unwrap();
        assert_eq!(loaded.entries[0].generation_id, Some(job.id));
        assert_eq!(loaded.entries[0].asset_id, Some(asset_ids[0]));
        assert_eq!(loaded.entries[1].generation_id, None);
    }
}
