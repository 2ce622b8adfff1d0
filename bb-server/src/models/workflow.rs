//! Workflow patterns: reusable multi-step generation recipes

use bb_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    double_option, generation::MAX_MODEL_LEN, normalize_tags, optional_text, require_text,
    GenerationKind, ProviderKind,
};

pub const MIN_STEPS: usize = 1;
pub const MAX_STEPS: usize = 20;
pub const MAX_WORKFLOW_NAME_LEN: usize = 200;
pub const MAX_STEP_NAME_LEN: usize = 100;
pub const MAX_WORKFLOW_DESCRIPTION_LEN: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStep {
    pub name: String,
    pub provider: ProviderKind,
    pub kind: GenerationKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_parameters")]
    pub parameters: serde_json::Value,
}

fn default_parameters() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl WorkflowStep {
    fn normalized(self, index: usize) -> Result<Self> {
        let name = require_text(&self.name, &format!("steps[{}].name", index), MAX_STEP_NAME_LEN)?;
        if !self.provider.supports(self.kind) {
            return Err(Error::InvalidInput(format!(
                "steps[{}]: provider '{}' does not support {} generation",
                index, self.provider, self.kind
            )));
        }
        if !self.parameters.is_object() {
            return Err(Error::InvalidInput(format!(
                "steps[{}].parameters must be a JSON object",
                index
            )));
        }
        let model = optional_text(self.model, "model", MAX_MODEL_LEN)?;
        Ok(Self { name, model, ..self })
    }
}

/// Validate a step list (1..=20 steps, provider/kind compatibility)
pub fn validate_steps(steps: Vec<WorkflowStep>) -> Result<Vec<WorkflowStep>> {
    if steps.len() < MIN_STEPS || steps.len() > MAX_STEPS {
        return Err(Error::InvalidInput(format!(
            "a workflow needs between {} and {} steps",
            MIN_STEPS, MAX_STEPS
        )));
    }
    steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| step.normalized(i))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowPattern {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
    pub tags: Vec<String>,
    pub use_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowPattern {
    pub fn apply(&mut self, patch: UpdateWorkflowRequest) -> Result<()> {
        if let Some(name) = patch.name {
            self.name = require_text(&name, "name", MAX_WORKFLOW_NAME_LEN)?;
        }
        if let Some(description) = patch.description {
            self.description =
                optional_text(description, "description", MAX_WORKFLOW_DESCRIPTION_LEN)?;
        }
        if let Some(steps) = patch.steps {
            self.steps = validate_steps(steps)?;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateWorkflowRequest {
    pub fn validate(&mut self) -> Result<()> {
        self.name = require_text(&self.name, "name", MAX_WORKFLOW_NAME_LEN)?;
        self.description =
            optional_text(self.description.take(), "description", MAX_WORKFLOW_DESCRIPTION_LEN)?;
        self.steps = validate_steps(std::mem::take(&mut self.steps))?;
        self.tags = normalize_tags(std::mem::take(&mut self.tags))?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateWorkflowRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub steps: Option<Vec<WorkflowStep>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(provider: &str, kind: &str) -> WorkflowStep {
        serde_json::from_value(serde_json::json!({
            "name": "step",
            "provider": provider,
            "kind": kind,
        }))
        .unwrap()
    }

    #[test]
    fn test_step_count_bounds() {
        assert!(validate_steps(vec![]).is_err());
        let many: Vec<WorkflowStep> = (0..21).map(|_| step("replicate", "image")).collect();
        assert!(validate_steps(many).is_err());
    }

    #[test]
    fn test_step_provider_kind_compatibility() {
        let steps = validate_steps(vec![step("replicate", "image"), step("akool", "lipsync")]).unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps[0].parameters.is_object());

        let err = validate_steps(vec![step("runway", "image")]).unwrap_err();
        assert!(err.to_string().contains("steps[0]"));
    }

    #[test]
    fn test_unknown_provider_fails_to_parse() {
        let parsed: std::result::Result<WorkflowStep, _> = serde_json::from_value(serde_json::json!({
            "name": "x", "provider": "midjourney", "kind": "image"
        }));
        assert!(parsed.is_err());
    }
}
