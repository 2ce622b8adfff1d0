//! Experiments: hypotheses tracked against a set of assets

use bb_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::{double_option, optional_text, require_text, Asset};

pub const MAX_EXPERIMENT_NAME_LEN: usize = 200;
pub const MAX_NOTES_LEN: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    #[default]
    Planned,
    Running,
    Completed,
    Archived,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Planned => "planned",
            ExperimentStatus::Running => "running",
            ExperimentStatus::Completed => "completed",
            ExperimentStatus::Archived => "archived",
        }
    }
}

impl FromStr for ExperimentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "planned" => Ok(ExperimentStatus::Planned),
            "running" => Ok(ExperimentStatus::Running),
            "completed" => Ok(ExperimentStatus::Completed),
            "archived" => Ok(ExperimentStatus::Archived),
            other => Err(Error::InvalidInput(format!("unknown experiment status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    pub id: Uuid,
    pub user_id: String,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub hypothesis: Option<String>,
    pub notes: Option<String>,
    pub status: ExperimentStatus,
    pub concluded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Experiment {
    /// Change status; `completed` stamps `concluded_at`, anything else clears it
    pub fn set_status(&mut self, status: ExperimentStatus, now: DateTime<Utc>) {
        if status == ExperimentStatus::Completed {
            if self.status != ExperimentStatus::Completed || self.concluded_at.is_none() {
                self.concluded_at = Some(now);
            }
        } else {
            self.concluded_at = None;
        }
        self.status = status;
    }

    /// Apply a patch in place; `project_id` ownership is checked by the caller
    pub fn apply(&mut self, patch: UpdateExperimentRequest, now: DateTime<Utc>) -> Result<()> {
        if let Some(name) = patch.name {
            self.name = require_text(&name, "name", MAX_EXPERIMENT_NAME_LEN)?;
        }
        if let Some(hypothesis) = patch.hypothesis {
            self.hypothesis = optional_text(hypothesis, "hypothesis", MAX_NOTES_LEN)?;
        }
        if let Some(notes) = patch.notes {
            self.notes = optional_text(notes, "notes", MAX_NOTES_LEN)?;
        }
        if let Some(project_id) = patch.project_id {
            self.project_id = project_id;
        }
        if let Some(status) = patch.status {
            self.set_status(status, now);
        }
        Ok(())
    }
}

/// Asset linked to an experiment
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentAsset {
    pub asset: Asset,
    pub note: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Experiment plus its linked assets (oldest link first)
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentDetail {
    #[serde(flatten)]
    pub experiment: Experiment,
    pub assets: Vec<ExperimentAsset>,
}

#[derive(Debug, Deserialize)]
pub struct CreateExperimentRequest {
    pub name: String,
    #[serde(default)]
    pub hypothesis: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<ExperimentStatus>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

impl CreateExperimentRequest {
    pub fn validate(&mut self) -> Result<()> {
        self.name = require_text(&self.name, "name", MAX_EXPERIMENT_NAME_LEN)?;
        self.hypothesis = optional_text(self.hypothesis.take(), "hypothesis", MAX_NOTES_LEN)?;
        self.notes = optional_text(self.notes.take(), "notes", MAX_NOTES_LEN)?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateExperimentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub hypothesis: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<ExperimentStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct AddExperimentAssetRequest {
    pub asset_id: Uuid,
    #[serde(default)]
    pub note: Option<String>,
}
