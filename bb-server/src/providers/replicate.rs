//! Replicate predictions API client
//!
//! Models are addressed either as `owner/name` (latest version, official
//! models endpoint) or `owner/name:version` (pinned version).

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use super::{
    build_client, download_capped, error_from_response, GenerationProvider, ProviderError,
    ProviderJobRequest, ProviderKind, ProviderStatus,
};

pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";

/// Where a model reference is submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRef<'a> {
    /// `owner/name`
    Latest { owner: &'a str, name: &'a str },
    /// `owner/name:version`
    Version { version: &'a str },
}

/// Parse `owner/name` or `owner/name:version`
pub fn parse_model_ref(model: &str) -> Result<ModelRef<'_>, ProviderError> {
    let invalid = || {
        ProviderError::InvalidRequest(format!(
            "replicate model '{}' must be 'owner/name' or 'owner/name:version'",
            model
        ))
    };

    let (path, version) = match model.split_once(':') {
        Some((path, version)) => (path, Some(version)),
        None => (model, None),
    };
    let (owner, name) = path.split_once('/').ok_or_else(invalid)?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return Err(invalid());
    }

    match version {
        Some(v) if v.is_empty() => Err(invalid()),
        Some(v) => Ok(ModelRef::Version { version: v }),
        None => Ok(ModelRef::Latest { owner, name }),
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
}

/// Map a prediction's status and output onto the local tri-state
fn map_prediction(status: &str, output: &Value, error: &Value) -> ProviderStatus {
    match status {
        "starting" | "processing" => ProviderStatus::Pending {
            detail: status.to_string(),
        },
        "succeeded" => ProviderStatus::Succeeded {
            outputs: output_urls(output),
        },
        "failed" => ProviderStatus::Failed {
            reason: match error {
                Value::String(s) if !s.is_empty() => s.clone(),
                Value::Null => "prediction failed".to_string(),
                other => other.to_string(),
            },
        },
        "canceled" => ProviderStatus::Failed {
            reason: "canceled".to_string(),
        },
        other => ProviderStatus::Pending {
            detail: other.to_string(),
        },
    }
}

/// Output is a single URL or a list of URLs depending on the model
fn output_urls(output: &Value) -> Vec<String> {
    match output {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

pub struct ReplicateProvider {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
}

impl std::fmt::Debug for ReplicateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicateProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ReplicateProvider {
    pub fn new(api_token: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client()?,
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_input(request: &ProviderJobRequest) -> Value {
        let mut input = match &request.parameters {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        if let Some(prompt) = &request.prompt {
            input.insert("prompt".to_string(), json!(prompt));
        }
        if let Some(negative) = &request.negative_prompt {
            input.insert("negative_prompt".to_string(), json!(negative));
        }
        if let Some(image) = &request.inputs.image_url {
            input.entry("image".to_string()).or_insert_with(|| json!(image));
        }
        Value::Object(input)
    }

    async fn send_prediction(&self, builder: reqwest::RequestBuilder) -> Result<Prediction, ProviderError> {
        let response = builder.bearer_auth(&self.api_token).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json::<Prediction>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl GenerationProvider for ReplicateProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Replicate
    }

    async fn submit(&self, request: &ProviderJobRequest) -> Result<String, ProviderError> {
        let model = request
            .model
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidRequest("replicate requires a model".into()))?;
        let input = Self::build_input(request);

        let builder = match parse_model_ref(model)? {
            ModelRef::Version { version } => self
                .client
                .post(format!("{}/v1/predictions", self.base_url))
                .json(&json!({ "version": version, "input": input })),
            ModelRef::Latest { owner, name } => self
                .client
                .post(format!("{}/v1/models/{}/{}/predictions", self.base_url, owner, name))
                .json(&json!({ "input": input })),
        };

        let prediction = self.send_prediction(builder).await?;
        info!(model, prediction_id = %prediction.id, "Replicate prediction created");
        Ok(prediction.id)
    }

    async fn status(&self, job_id: &str) -> Result<ProviderStatus, ProviderError> {
        let builder = self
            .client
            .get(format!("{}/v1/predictions/{}", self.base_url, job_id));
        let prediction = self.send_prediction(builder).await?;
        Ok(map_prediction(&prediction.status, &prediction.output, &prediction.error))
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ProviderError> {
        let builder = self
            .client
            .post(format!("{}/v1/predictions/{}/cancel", self.base_url, job_id));
        self.send_prediction(builder).await?;
        info!(prediction_id = job_id, "Replicate prediction cancel requested");
        Ok(())
    }

    async fn download_output(&self, url: &str, max_bytes: u64) -> Result<Bytes, ProviderError> {
        download_capped(&self.client, url, max_bytes).await
    }
}
