//! Assets: stored content plus the parameters that produced it

use bb_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{double_option, normalize_tags, optional_text, require_text};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_TEXT_CONTENT_LEN: usize = 1_000_000;
pub const MAX_FILE_NAME_LEN: usize = 120;

/// Content kind of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
    Audio,
    Text,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
            AssetKind::Audio => "audio",
            AssetKind::Text => "text",
        }
    }

    /// Kind for a MIME type, `None` when the type is not storable
    pub fn from_mime(mime: &str) -> Option<Self> {
        let top = mime.split('/').next()?.trim().to_ascii_lowercase();
        match top.as_str() {
            "image" => Some(AssetKind::Image),
            "video" => Some(AssetKind::Video),
            "audio" => Some(AssetKind::Audio),
            "text" => Some(AssetKind::Text),
            _ => None,
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(AssetKind::Image),
            "video" => Ok(AssetKind::Video),
            "audio" => Ok(AssetKind::Audio),
            "text" => Ok(AssetKind::Text),
            other => Err(Error::InvalidInput(format!("unknown asset kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub id: Uuid,
    pub user_id: String,
    pub project_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub kind: AssetKind,
    pub title: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub parameters: serde_json::Value,
    pub generation_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to insert an asset row whose bytes are already stored
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub id: Uuid,
    pub user_id: String,
    pub project_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub kind: AssetKind,
    pub title: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub prompt: Option<String>,
    pub parameters: serde_json::Value,
    pub generation_id: Option<Uuid>,
    pub tags: Vec<String>,
}

/// Query string of GET /api/assets
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AssetFilter {
    pub project_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub kind: Option<AssetKind>,
    pub favorite: Option<bool>,
    /// Substring of title or prompt
    pub q: Option<String>,
    pub tag: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTextAssetRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub folder_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl CreateTextAssetRequest {
    pub fn validate(&mut self) -> Result<()> {
        self.title = require_text(&self.title, "title", MAX_TITLE_LEN)?;
        if self.content.is_empty() {
            return Err(Error::InvalidInput("content must not be empty".to_string()));
        }
        if self.content.len() > MAX_TEXT_CONTENT_LEN {
            return Err(Error::InvalidInput(format!(
                "content must be at most {} bytes",
                MAX_TEXT_CONTENT_LEN
            )));
        }
        self.tags = normalize_tags(std::mem::take(&mut self.tags))?;
        self.prompt = optional_text(self.prompt.take(), "prompt", super::prompt::MAX_PROMPT_TEXT_LEN)?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAssetRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub favorite: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub folder_id: Option<Option<Uuid>>,
}

/// Reduce a client-supplied file name to `[A-Za-z0-9._-]`
///
/// ```
/// use bb_server::models::asset::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("my photo (1).PNG"), "my_photo__1_.PNG");
/// assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    // Only the last path component counts
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let cleaned: String = cleaned.chars().take(MAX_FILE_NAME_LEN).collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Default file extension for a MIME type
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "audio/mpeg" => "mp3",
        "audio/x-wav" | "audio/wav" => "wav",
        "text/plain" => "txt",
        _ => "bin",
    }
}
