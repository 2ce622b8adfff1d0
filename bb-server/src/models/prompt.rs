//! Saved prompts

use bb_common::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{double_option, normalize_tags, optional_text, require_text};

pub const MAX_PROMPT_TITLE_LEN: usize = 200;
pub const MAX_PROMPT_TEXT_LEN: usize = 10_000;
pub const MAX_CATEGORY_LEN: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prompt {
    pub id: Uuid,
    pub user_id: String,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub text: String,
    pub negative_prompt: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub favorite: bool,
    pub use_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PromptFilter {
    pub project_id: Option<Uuid>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub favorite: Option<bool>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePromptRequest {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

impl CreatePromptRequest {
    pub fn validate(&mut self) -> Result<()> {
        self.title = require_text(&self.title, "title", MAX_PROMPT_TITLE_LEN)?;
        self.text = require_text(&self.text, "text", MAX_PROMPT_TEXT_LEN)?;
        self.negative_prompt =
            optional_text(self.negative_prompt.take(), "negative_prompt", MAX_PROMPT_TEXT_LEN)?;
        self.category = optional_text(self.category.take(), "category", MAX_CATEGORY_LEN)?;
        self.tags = normalize_tags(std::mem::take(&mut self.tags))?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePromptRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub negative_prompt: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub favorite: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<Uuid>>,
}

impl Prompt {
    /// Apply a patch in place; `project_id` is checked by the caller
    pub fn apply(&mut self, patch: UpdatePromptRequest) -> Result<()> {
        if let Some(title) = patch.title {
            self.title = require_text(&title, "title", MAX_PROMPT_TITLE_LEN)?;
        }
        if let Some(text) = patch.text {
            self.text = require_text(&text, "text", MAX_PROMPT_TEXT_LEN)?;
        }
        if let Some(negative) = patch.negative_prompt {
            self.negative_prompt = optional_text(negative, "negative_prompt", MAX_PROMPT_TEXT_LEN)?;
        }
        if let Some(category) = patch.category {
            self.category = optional_text(category, "category", MAX_CATEGORY_LEN)?;
        }
        if let Some(tags) = patch.tags {
            self.tags = normalize_tags(tags)?;
        }
        if let Some(favorite) = patch.favorite {
            self.favorite = favorite;
        }
        if let Some(project_id) = patch.project_id {
            self.project_id = project_id;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_validation_limits() {
        let mut req: CreatePromptRequest =
            serde_json::from_str(r#"{"title": "Sunset", "text": "a red sky", "category": " "}"#)
                .unwrap();
        req.validate().unwrap();
        assert_eq!(req.category, None);

        let mut too_long = CreatePromptRequest {
            title: "t".to_string(),
            text: "x".repeat(MAX_PROMPT_TEXT_LEN + 1),
            negative_prompt: None,
            category: None,
            tags: vec![],
            favorite: false,
            project_id: None,
        };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_apply_patch() {
        let now = Utc::now();
        let mut prompt = Prompt {
            id: Uuid::new_v4(),
            user_id: "u".into(),
            project_id: Some(Uuid::new_v4()),
            title: "t".into(),
            text: "x".into(),
            negative_prompt: Some("blurry".into()),
            category: None,
            tags: vec![],
            favorite: false,
            use_count: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };

        let patch: UpdatePromptRequest = serde_json::from_str(
            r#"{"favorite": true, "negative_prompt": null, "project_id": null, "tags": ["b"]}"#,
        )
        .unwrap();
        prompt.apply(patch).unwrap();

        assert!(prompt.favorite);
        assert_eq!(prompt.negative_prompt, None);
        assert_eq!(prompt.project_id, None);
        assert_eq!(prompt.tags, vec!["b".to_string()]);
        assert_eq!(prompt.text, "x");
    }
}
