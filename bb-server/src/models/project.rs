//! Projects: top-level containers for folders and assets

use bb_common::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{double_option, optional_text, require_text};

pub const MAX_PROJECT_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Project with container counts, returned by GET /api/projects/:id
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub folder_count: i64,
    pub asset_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateProjectRequest {
    /// Returns the normalized (name, description)
    pub fn validate(self) -> Result<(String, Option<String>)> {
        let name = require_text(&self.name, "name", MAX_PROJECT_NAME_LEN)?;
        let description = optional_text(self.description, "description", MAX_DESCRIPTION_LEN)?;
        Ok((name, description))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl Project {
    /// Apply a validated patch in place
    pub fn apply(&mut self, patch: UpdateProjectRequest) -> Result<()> {
        if let Some(name) = patch.name {
            self.name = require_text(&name, "name", MAX_PROJECT_NAME_LEN)?;
        }
        if let Some(description) = patch.description {
            self.description = optional_text(description, "description", MAX_DESCRIPTION_LEN)?;
        }
        Ok(())
    }
}
