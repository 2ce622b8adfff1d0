//! Model comparisons: one prompt run through several models of a provider

use bb_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    generation::MAX_MODEL_LEN, optional_text, prompt::MAX_PROMPT_TEXT_LEN, require_text,
    GenerationInputs, GenerationKind, ProviderKind,
};

pub const MIN_MODELS: usize = 2;
pub const MAX_MODELS: usize = 8;
pub const MAX_COMPARISON_NAME_LEN: usize = 200;
pub const MAX_ENTRY_NOTES_LEN: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonEntry {
    pub model: String,
    pub asset_id: Option<Uuid>,
    pub generation_id: Option<Uuid>,
    pub rating: Option<u8>,
    pub notes: Option<String>,
}

impl ComparisonEntry {
    pub fn new(model: String) -> Self {
        Self {
            model,
            asset_id: None,
            generation_id: None,
            rating: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelComparison {
    pub id: Uuid,
    pub user_id: String,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub prompt: String,
    pub provider: ProviderKind,
    /// In the order the models were given at creation
    pub entries: Vec<ComparisonEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelComparison {
    /// Highest-rated model; ties go to the earlier entry
    pub fn winner(&self) -> Option<&str> {
        let mut best: Option<(&ComparisonEntry, u8)> = None;
        for entry in &self.entries {
            if let Some(rating) = entry.rating {
                match best {
                    Some((_, best_rating)) if best_rating >= rating => {}
                    _ => best = Some((entry, rating)),
                }
            }
        }
        best.map(|(entry, _)| entry.model.as_str())
    }

    pub fn entry_mut(&mut self, model: &str) -> Option<&mut ComparisonEntry> {
        self.entries.iter_mut().find(|e| e.model == model)
    }
}

/// Comparison plus computed winner, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonView {
    #[serde(flatten)]
    pub comparison: ModelComparison,
    pub winner: Option<String>,
}

impl From<ModelComparison> for ComparisonView {
    fn from(comparison: ModelComparison) -> Self {
        let winner = comparison.winner().map(str::to_string);
        Self { comparison, winner }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateComparisonRequest {
    pub name: String,
    pub prompt: String,
    pub provider: ProviderKind,
    pub models: Vec<String>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

impl CreateComparisonRequest {
    pub fn validate(&mut self) -> Result<()> {
        self.name = require_text(&self.name, "name", MAX_COMPARISON_NAME_LEN)?;
        self.prompt = require_text(&self.prompt, "prompt", MAX_PROMPT_TEXT_LEN)?;

        let mut models: Vec<String> = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let model = require_text(model, "model", MAX_MODEL_LEN)?;
            if models.contains(&model) {
                return Err(Error::InvalidInput(format!("model '{}' listed twice", model)));
            }
            models.push(model);
        }
        if models.len() < MIN_MODELS || models.len() > MAX_MODELS {
            return Err(Error::InvalidInput(format!(
                "a comparison needs between {} and {} models",
                MIN_MODELS, MAX_MODELS
            )));
        }
        self.models = models;
        Ok(())
    }
}

/// Body of PUT /api/comparisons/:id/entries
///
/// Model ids contain `/`, so the model travels in the body.
#[derive(Debug, Deserialize)]
pub struct RecordResultRequest {
    pub model: String,
    #[serde(default, deserialize_with = "super::double_option")]
    pub asset_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub rating: Option<Option<u8>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub notes: Option<Option<String>>,
}

impl RecordResultRequest {
    /// Apply to an entry; asset ownership is checked by the caller
    pub fn apply_to(self, entry: &mut ComparisonEntry) -> Result<()> {
        if let Some(rating) = self.rating {
            if let Some(r) = rating {
                if !(1..=5).contains(&r) {
                    return Err(Error::InvalidInput("rating must be between 1 and 5".to_string()));
                }
            }
            entry.rating = rating;
        }
        if let Some(notes) = self.notes {
            entry.notes = optional_text(notes, "notes", MAX_ENTRY_NOTES_LEN)?;
        }
        if let Some(asset_id) = self.asset_id {
            entry.asset_id = asset_id;
        }
        Ok(())
    }
}

/// Body of POST /api/comparisons/:id/run
#[derive(Debug, Default, Deserialize)]
pub struct RunComparisonRequest {
    /// Defaults to the first kind the provider supports
    #[serde(default)]
    pub kind: Option<GenerationKind>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    #[serde(default)]
    pub inputs: GenerationInputs,
    #[serde(default)]
    pub folder_id: Option<Uuid>,
}

impl RunComparisonRequest {
    pub fn kind_for(&self, provider: ProviderKind) -> Result<GenerationKind> {
        let kind = match self.kind {
            Some(kind) => kind,
            None => [GenerationKind::Image, GenerationKind::Video, GenerationKind::Lipsync]
                .into_iter()
                .find(|k| provider.supports(*k))
                .ok_or_else(|| Error::Internal(format!("provider '{}' supports no generation kind", provider)))?,
        };
        if !provider.supports(kind) {
            return Err(Error::InvalidInput(format!(
                "provider '{}' does not support {} generation",
                provider, kind
            )));
        }
        Ok(kind)
    }
}
