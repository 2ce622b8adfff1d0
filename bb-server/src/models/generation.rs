//! Generation jobs submitted to external providers

use bb_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{optional_text, prompt::MAX_PROMPT_TEXT_LEN, require_text};

pub const MAX_MODEL_LEN: usize = 200;
pub const MAX_URL_LEN: usize = 2048;

/// What a generation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Image,
    Video,
    Lipsync,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Image => "image",
            GenerationKind::Video => "video",
            GenerationKind::Lipsync => "lipsync",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(GenerationKind::Image),
            "video" => Ok(GenerationKind::Video),
            "lipsync" => Ok(GenerationKind::Lipsync),
            other => Err(Error::InvalidInput(format!("unknown generation kind '{}'", other))),
        }
    }
}

/// External model host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Replicate,
    Runway,
    Akool,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Replicate, ProviderKind::Runway, ProviderKind::Akool];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Replicate => "replicate",
            ProviderKind::Runway => "runway",
            ProviderKind::Akool => "akool",
        }
    }

    /// Generation kinds the provider's API can produce
    pub fn supports(&self, kind: GenerationKind) -> bool {
        matches!(
            (self, kind),
            (ProviderKind::Replicate, GenerationKind::Image)
                | (ProviderKind::Replicate, GenerationKind::Video)
                | (ProviderKind::Runway, GenerationKind::Video)
                | (ProviderKind::Akool, GenerationKind::Lipsync)
        )
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "replicate" => Ok(ProviderKind::Replicate),
            "runway" => Ok(ProviderKind::Runway),
            "akool" => Ok(ProviderKind::Akool),
            other => Err(Error::InvalidInput(format!("unknown provider '{}'", other))),
        }
    }
}

/// Local view of a job's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(Error::InvalidInput(format!("unknown job status '{}'", other))),
        }
    }
}

/// Media URLs fed to image-to-video and lipsync jobs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationJob {
    pub id: Uuid,
    pub user_id: String,
    pub provider: ProviderKind,
    pub kind: GenerationKind,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub parameters: serde_json::Value,
    pub inputs: GenerationInputs,
    pub provider_job_id: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub output_urls: Vec<String>,
    pub asset_ids: Vec<Uuid>,
    pub project_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub experiment_id: Option<Uuid>,
    pub comparison_id: Option<Uuid>,
    pub title: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGenerationRequest {
    pub provider: ProviderKind,
    pub kind: GenerationKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default = "empty_object")]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub inputs: GenerationInputs,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub folder_id: Option<Uuid>,
    #[serde(default)]
    pub experiment_id: Option<Uuid>,
    #[serde(default)]
    pub title: Option<String>,
    /// Set internally when a comparison run submits the job
    #[serde(skip)]
    pub comparison_id: Option<Uuid>,
}

impl CreateGenerationRequest {
    /// Normalize fields and check the inputs the provider requires
    pub fn validate(&mut self) -> Result<()> {
        if !self.provider.supports(self.kind) {
            return Err(Error::InvalidInput(format!(
                "provider '{}' does not support {} generation",
                self.provider, self.kind
            )));
        }

        self.model = optional_text(self.model.take(), "model", MAX_MODEL_LEN)?;
        self.prompt = optional_text(self.prompt.take(), "prompt", MAX_PROMPT_TEXT_LEN)?;
        self.negative_prompt =
            optional_text(self.negative_prompt.take(), "negative_prompt", MAX_PROMPT_TEXT_LEN)?;
        self.title = optional_text(self.title.take(), "title", super::asset::MAX_TITLE_LEN)?;

        if !self.parameters.is_object() {
            return Err(Error::InvalidInput("parameters must be a JSON object".to_string()));
        }

        self.inputs.image_url = check_url(self.inputs.image_url.take(), "inputs.image_url")?;
        self.inputs.video_url = check_url(self.inputs.video_url.take(), "inputs.video_url")?;
        self.inputs.audio_url = check_url(self.inputs.audio_url.take(), "inputs.audio_url")?;

        match self.provider {
            ProviderKind::Replicate => {
                if self.model.is_none() {
                    return Err(Error::InvalidInput("replicate generations require a model".to_string()));
                }
                if self.prompt.is_none() {
                    return Err(Error::InvalidInput("replicate generations require a prompt".to_string()));
                }
            }
            ProviderKind::Runway => {
                if self.inputs.image_url.is_none() {
                    return Err(Error::InvalidInput(
                        "runway generations require inputs.image_url".to_string(),
                    ));
                }
            }
            ProviderKind::Akool => {
                if self.inputs.video_url.is_none() || self.inputs.audio_url.is_none() {
                    return Err(Error::InvalidInput(
                        "lipsync generations require inputs.video_url and inputs.audio_url".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn check_url(value: Option<String>, field: &str) -> Result<Option<String>> {
    let Some(url) = optional_text(value, field, MAX_URL_LEN)? else {
        return Ok(None);
    };
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(Error::InvalidInput(format!("{} must be an http(s) URL", field)));
    }
    Ok(Some(url))
}

/// Query string of GET /api/generations
#[derive(Debug, Default, Clone, Deserialize)]
pub struct GenerationFilter {
    pub status: Option<JobStatus>,
    pub provider: Option<ProviderKind>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> CreateGenerationRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_provider_capabilities() {
        assert!(ProviderKind::Replicate.supports(GenerationKind::Image));
        assert!(ProviderKind::Replicate.supports(GenerationKind::Video));
        assert!(!ProviderKind::Replicate.supports(GenerationKind::Lipsync));
        assert!(ProviderKind::Runway.supports(GenerationKind::Video));
        assert!(!ProviderKind::Runway.supports(GenerationKind::Image));
        assert!(ProviderKind::Akool.supports(GenerationKind::Lipsync));
    }

    #[test]
    fn test_replicate_requires_model_and_prompt() {
        let mut req = request(r#"{"provider": "replicate", "kind": "image", "prompt": "a cat"}"#);
        assert!(req.validate().is_err());

        let mut req = request(
            r#"{"provider": "replicate", "kind": "image", "model": "black-forest-labs/flux-schnell", "prompt": "a cat"}"#,
        );
        req.validate().unwrap();
        assert!(req.parameters.is_object());
    }

    #[test]
    fn test_runway_requires_image_url() {
        let mut req = request(r#"{"provider": "runway", "kind": "video", "prompt": "pan left"}"#);
        assert!(req.validate().is_err());

        let mut req = request(
            r#"{"provider": "runway", "kind": "video", "inputs": {"image_url": "ftp://x/y.png"}}"#,
        );
        assert!(req.validate().is_err());

        let mut req = request(
            r#"{"provider": "runway", "kind": "video", "inputs": {"image_url": "https://cdn.example.com/a.png"}}"#,
        );
        req.validate().unwrap();
    }

    #[test]
    fn test_akool_requires_both_media() {
        let mut req = request(
            r#"{"provider": "akool", "kind": "lipsync", "inputs": {"video_url": "https://x/v.mp4"}}"#,
        );
        assert!(req.validate().is_err());

        let mut req = request(
            r#"{"provider": "akool", "kind": "lipsync", "inputs": {"video_url": "https://x/v.mp4", "audio_url": "https://x/a.mp3"}}"#,
        );
        req.validate().unwrap();
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mut req = request(
            r#"{"provider": "akool", "kind": "image", "inputs": {"video_url": "https://x/v.mp4", "audio_url": "https://x/a.mp3"}}"#,
        );
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("does not support"));
    }

    #[test]
    fn test_parameters_must_be_object() {
        let mut req = request(
            r#"{"provider": "replicate", "kind": "image", "model": "m/n", "prompt": "p", "parameters": [1]}"#,
        );
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_job_status() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert_eq!("succeeded".parse::<JobStatus>().unwrap(), JobStatus::Succeeded);
    }
}
