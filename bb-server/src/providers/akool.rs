//! AKOOL lipsync client
//!
//! Every AKOOL response is wrapped in `{code, msg, data}`; `code` 1000 means
//! success regardless of the HTTP status.

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::{
    build_client, download_capped, error_from_response, GenerationProvider, ProviderError,
    ProviderJobRequest, ProviderKind, ProviderStatus,
};

pub const DEFAULT_BASE_URL: &str = "https://openapi.akool.com";
const SUCCESS_CODE: i64 = 1000;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LipsyncJob {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    video_status: i64,
    #[serde(default)]
    video: Option<String>,
}

fn map_video_status(info: VideoInfo) -> ProviderStatus {
    match info.video_status {
        1 => ProviderStatus::Pending {
            detail: "queueing".to_string(),
        },
        2 => ProviderStatus::Pending {
            detail: "processing".to_string(),
        },
        3 => ProviderStatus::Succeeded {
            outputs: info.video.filter(|v| !v.is_empty()).into_iter().collect(),
        },
        4 => ProviderStatus::Failed {
            reason: "lipsync processing failed".to_string(),
        },
        other => ProviderStatus::Pending {
            detail: format!("status {}", other),
        },
    }
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, ProviderError> {
    if envelope.code != SUCCESS_CODE {
        return Err(ProviderError::Api {
            status: 200,
            message: format!(
                "code {}: {}",
                envelope.code,
                envelope.msg.unwrap_or_default()
            ),
        });
    }
    envelope
        .data
        .ok_or_else(|| ProviderError::InvalidResponse("missing data".to_string()))
}

pub struct AkoolProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for AkoolProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AkoolProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AkoolProvider {
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

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = builder.header("x-api-key", &self.api_key).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        unwrap_envelope(envelope)
    }
}

#[async_trait]
impl GenerationProvider for AkoolProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Akool
    }

    async fn submit(&self, request: &ProviderJobRequest) -> Result<String, ProviderError> {
        let (Some(video_url), Some(audio_url)) =
            (&request.inputs.video_url, &request.inputs.audio_url)
        else {
            return Err(ProviderError::InvalidRequest(
                "lipsync requires inputs.video_url and inputs.audio_url".to_string(),
            ));
        };

        let job: LipsyncJob = self
            .send(
                self.client
                    .post(format!("{}/api/open/v3/content/video/lipsync", self.base_url))
                    .json(&json!({
                        "video_url": video_url,
                        "audio_url": audio_url,
                        "webhookUrl": "",
                    })),
            )
            .await?;

        info!(video_model_id = %job.id, "AKOOL lipsync job created");
        Ok(job.id)
    }

    async fn status(&self, job_id: &str) -> Result<ProviderStatus, ProviderError> {
        let info: VideoInfo = self
            .send(
                self.client
                    .get(format!(
                        "{}/api/open/v3/content/video/infobymodelid",
                        self.base_url
                    ))
                    .query(&[("video_model_id", job_id)]),
            )
            .await?;
        Ok(map_video_status(info))
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ProviderError> {
        warn!(video_model_id = job_id, "AKOOL has no cancel endpoint; job left running upstream");
        Ok(())
    }

    async fn download_output(&self, url: &str, max_bytes: u64) -> Result<Bytes, ProviderError> {
        download_capped(&self.client, url, max_bytes).await
    }
}
