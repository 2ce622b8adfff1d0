//! Folders and materialized path maintenance
//!
//! Every folder row stores its full path (`/renders/final`). A root folder's
//! path is `"/" + name`; a child's path is `parent.path + "/" + name`. Paths
//! are unique within a project, which is what guarantees that no two
//! sibling folders share a name.

use bb_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::double_option;

pub const MAX_FOLDER_NAME_LEN: usize = 100;

/// Path separator
pub const SEPARATOR: char = '/';

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    pub id: Uuid,
    pub user_id: String,
    pub project_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// Rename and/or move. `parent_id: null` moves the folder to the project root.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateFolderRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
}

/// Validate a single path segment
pub fn validate_folder_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("folder name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "folder name must be at most {} characters",
            MAX_FOLDER_NAME_LEN
        )));
    }
    if name.contains(SEPARATOR) {
        return Err(Error::InvalidInput("folder name must not contain '/'".to_string()));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidInput(format!("'{}' is not a valid folder name", name)));
    }
    if name.chars().any(char::is_control) {
        return Err(Error::InvalidInput(
            "folder name must not contain control characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Materialized path of a folder named `name` under `parent_path`
///
/// ```
/// use bb_server::models::folder::join_path;
///
/// assert_eq!(join_path(None, "renders"), "/renders");
/// assert_eq!(join_path(Some("/renders"), "final"), "/renders/final");
/// ```
pub fn join_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(parent) => format!("{}{}{}", parent.trim_end_matches(SEPARATOR), SEPARATOR, name),
        None => format!("{}{}", SEPARATOR, name),
    }
}

/// True when `path` is `ancestor` itself or lies below it
pub fn is_same_or_descendant(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || (path.starts_with(ancestor) && path[ancestor.len()..].starts_with(SEPARATOR))
}

/// Replace the `old_prefix` of `path` with `new_prefix`
///
/// Returns `None` when `path` is not `old_prefix` or one of its descendants
/// (`/ab` is not below `/a`).
pub fn rebase_path(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if !is_same_or_descendant(path, old_prefix) {
        return None;
    }
    Some(format!("{}{}", new_prefix, &path[old_prefix.len()..]))
}
