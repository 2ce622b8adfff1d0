//! Generation provider clients
//!
//! Each provider is an opaque HTTP API with its own job lifecycle. The
//! [`GenerationProvider`] trait reduces them to submit / status / cancel /
//! download, and [`ProviderStatus`] is the local tri-state every
//! provider-specific status maps onto.

pub mod akool;
#[cfg(test)]
pub(crate) mod mock_upstream;
pub mod poll;
pub mod replicate;
pub mod runway;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub use crate::models::{GenerationInputs, GenerationKind, ProviderKind};
pub use poll::{poll_until_complete, PollConfig, PollError};

/// Timeout for submit/status/cancel calls
pub const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for downloading an output file
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest error body echoed back from a provider
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Provider client errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or protocol failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status or error envelope
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response did not have the expected shape
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    /// Request cannot be expressed for this provider
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Output larger than the download cap
    #[error("Output exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

impl ProviderError {
    /// True for errors caused by the caller's request rather than the provider
    pub fn is_client_error(&self) -> bool {
        matches!(self, ProviderError::InvalidRequest(_))
    }
}

/// Provider-neutral job description
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderJobRequest {
    pub kind: GenerationKind,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub parameters: serde_json::Value,
    pub inputs: GenerationInputs,
}

/// Local tri-state of a provider job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    /// Queued or running; `detail` is the provider's own status word
    Pending { detail: String },
    /// Finished; `outputs` are downloadable URLs
    Succeeded { outputs: Vec<String> },
    Failed { reason: String },
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn supports(&self, kind: GenerationKind) -> bool {
        self.kind().supports(kind)
    }

    /// Submit a job, returning the provider's job id
    async fn submit(&self, request: &ProviderJobRequest) -> Result<String, ProviderError>;

    async fn status(&self, job_id: &str) -> Result<ProviderStatus, ProviderError>;

    /// Ask the provider to stop a job (best effort)
    async fn cancel(&self, job_id: &str) -> Result<(), ProviderError>;

    /// Fetch an output file, refusing anything over `max_bytes`
    async fn download_output(&self, url: &str, max_bytes: u64) -> Result<Bytes, ProviderError>;
}

/// Configured providers, keyed by kind
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn GenerationProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("configured", &self.configured())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn GenerationProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn GenerationProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// Configured provider kinds in a stable order
    pub fn configured(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|k| self.providers.contains_key(k))
            .collect()
    }
}

/// HTTP client shared by the provider implementations
pub(crate) fn build_client() -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder()
        .timeout(API_TIMEOUT)
        .user_agent(concat!("binary-blender/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Turn a non-success response into [`ProviderError::Api`]
pub(crate) async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::Api {
        status,
        message: error_message_from_body(&body),
    }
}

/// Pull a readable message out of an error body
///
/// Providers use `detail`, `error`, `message` or `msg`; anything else is
/// echoed truncated.
pub(crate) fn error_message_from_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["detail", "error", "message", "msg"] {
            match value.get(field) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(serde_json::Value::Object(obj)) => {
                    if let Some(serde_json::Value::String(s)) = obj.get("message") {
                        return s.clone();
                    }
                }
                _ => {}
            }
        }
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Download `url` into memory, aborting once `max_bytes` is exceeded
pub(crate) async fn download_capped(
    client: &reqwest::Client,
    url: &str,
    max_bytes: u64,
) -> Result<Bytes, ProviderError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| ProviderError::InvalidResponse(format!("invalid output URL '{}': {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ProviderError::InvalidResponse(format!(
            "unsupported output URL scheme '{}'",
            parsed.scheme()
        )));
    }

    let mut response = client.get(parsed).timeout(DOWNLOAD_TIMEOUT).send().await?;
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    if let Some(length) = response.content_length() {
        if length > max_bytes {
            return Err(ProviderError::TooLarge { limit: max_bytes });
        }
    }

    let mut buffer = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        if buffer.len() as u64 + chunk.len() as u64 > max_bytes {
            return Err(ProviderError::TooLarge { limit: max_bytes });
        }
        buffer.extend_from_slice(&chunk);
    }

    debug!(url, size = buffer.len(), "Downloaded provider output");
    Ok(buffer.freeze())
}
