//! RunwayML image-to-video client

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{
    build_client, download_capped, error_from_response, GenerationProvider, ProviderError,
    ProviderJobRequest, ProviderKind, ProviderStatus,
};

pub const DEFAULT_BASE_URL: &str = "https://api.dev.runwayml.com";
pub const API_VERSION: &str = "2024-11-06";
pub const DEFAULT_MODEL: &str = "gen3a_turbo";

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct ImageToVideoRequest {
    model: String,
    prompt_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CreatedTask {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Task {
    status: String,
    #[serde(default)]
    output: Option<Vec<String>>,
    #[serde(default)]
    failure: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
}

fn map_task(task: Task) -> ProviderStatus {
    match task.status.as_str() {
        "SUCCEEDED" => ProviderStatus::Succeeded {
            outputs: task.output.unwrap_or_default(),
        },
        "FAILED" => ProviderStatus::Failed {
            reason: task.failure.unwrap_or_else(|| "task failed".to_string()),
        },
        "CANCELLED" => ProviderStatus::Failed {
            reason: task.failure.unwrap_or_else(|| "task cancelled".to_string()),
        },
        // PENDING, THROTTLED, RUNNING and anything new
        other => ProviderStatus::Pending {
            detail: match task.progress {
                Some(p) => format!("{} {:.0}%", other, p * 100.0),
                None => other.to_string(),
            },
        },
    }
}

pub struct RunwayProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for RunwayProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunwayProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RunwayProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .header("X-Runway-Version", API_VERSION)
    }

    fn build_request(request: &ProviderJobRequest) -> Result<ImageToVideoRequest, ProviderError> {
        let prompt_image = request.inputs.image_url.clone().ok_or_else(|| {
            ProviderError::InvalidRequest("runway requires inputs.image_url".to_string())
        })?;
        let params = &request.parameters;

        Ok(ImageToVideoRequest {
            model: request.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            prompt_image,
            prompt_text: request.prompt.clone(),
            duration: params.get("duration").and_then(Value::as_u64),
            ratio: params.get("ratio").and_then(Value::as_str).map(str::to_string),
            seed: params.get("seed").and_then(Value::as_u64),
        })
    }
}

#[async_trait]
impl GenerationProvider for RunwayProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Runway
    }

    async fn submit(&self, request: &ProviderJobRequest) -> Result<String, ProviderError> {
        let body = Self::build_request(request)?;
        let response = self
            .authorized(self.client.post(format!("{}/v1/image_to_video", self.base_url)))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let task: CreatedTask = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        info!(task_id = %task.id, model = %body.model, "Runway task created");
        Ok(task.id)
    }

    async fn status(&self, job_id: &str) -> Result<ProviderStatus, ProviderError> {
        let response = self
            .authorized(self.client.get(format!("{}/v1/tasks/{}", self.base_url, job_id)))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let task: Task = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(map_task(task))
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ProviderError> {
        let response = self
            .authorized(self.client.delete(format!("{}/v1/tasks/{}", self.base_url, job_id)))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        info!(task_id = job_id, "Runway task cancelled");
        Ok(())
    }

    async fn download_output(&self, url: &str, max_bytes: u64) -> Result<Bytes, ProviderError> {
        download_capped(&self.client, url, max_bytes).await
    }
}
