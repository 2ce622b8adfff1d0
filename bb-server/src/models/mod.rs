//! Domain models, request bodies and their validation rules

pub mod asset;
pub mod comparison;
pub mod experiment;
pub mod folder;
pub mod generation;
pub mod project;
pub mod prompt;
pub mod workflow;

pub use asset::{Asset, AssetFilter, AssetKind, CreateTextAssetRequest, NewAsset, UpdateAssetRequest};
pub use comparison::{
    ComparisonEntry, CreateComparisonRequest, ModelComparison, RecordResultRequest,
    RunComparisonRequest,
};
pub use experiment::{
    AddExperimentAssetRequest, CreateExperimentRequest, Experiment, ExperimentAsset,
    ExperimentDetail, ExperimentStatus, UpdateExperimentRequest,
};
pub use folder::{CreateFolderRequest, Folder, UpdateFolderRequest};
pub use generation::{
    CreateGenerationRequest, GenerationFilter, GenerationInputs, GenerationJob, GenerationKind,
    JobStatus, ProviderKind,
};
pub use project::{CreateProjectRequest, Project, ProjectSummary, UpdateProjectRequest};
pub use prompt::{CreatePromptRequest, Prompt, PromptFilter, UpdatePromptRequest};
pub use workflow::{CreateWorkflowRequest, UpdateWorkflowRequest, WorkflowPattern, WorkflowStep};

use bb_common::{Error, Result};
use serde::{Deserialize, Deserializer};

/// Maximum number of tags on any taggable record
pub const MAX_TAGS: usize = 20;

/// Maximum length of a single tag
pub const MAX_TAG_LEN: usize = 50;

/// Deserialize a field that distinguishes "absent" from explicit `null`
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// absent → `None`, `null` → `Some(None)`, value → `Some(Some(v))`.
pub fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trim and length-check a required text field
pub fn require_text(value: &str, field: &str, max_chars: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    if trimmed.chars().count() > max_chars {
        return Err(Error::InvalidInput(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field; blank becomes `None`
pub fn optional_text(value: Option<String>, field: &str, max_chars: usize) -> Result<Option<String>> {
    match value {
        Some(v) if !v.trim().is_empty() => require_text(&v, field, max_chars).map(Some),
        _ => Ok(None),
    }
}

/// Trim, validate and deduplicate tags (order of first appearance kept)
pub fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::InvalidInput("tags must not be empty".to_string()));
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(Error::InvalidInput(format!(
                "tag '{}' exceeds {} characters",
                tag, MAX_TAG_LEN
            )));
        }
        if !normalized.iter().any(|t| t == tag) {
            normalized.push(tag.to_string());
        }
    }
    if normalized.len() > MAX_TAGS {
        return Err(Error::InvalidInput(format!("at most {} tags allowed", MAX_TAGS)));
    }
    Ok(normalized)
}
