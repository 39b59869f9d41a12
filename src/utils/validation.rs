use mongodb::bson::oid::ObjectId;

use crate::utils::error::ForumError;

pub const MAX_POST_TITLE: usize = 300;
pub const MAX_POST_CONTENT: usize = 10_000;
pub const MAX_COMMENT_CONTENT: usize = 5_000;
pub const MAX_COMMUNITY_NAME: usize = 50;
pub const MAX_COMMUNITY_DESCRIPTION: usize = 300;
pub const MAX_RULE_TITLE: usize = 100;
pub const MAX_RULE_DESCRIPTION: usize = 500;

/// Marker written over the content of soft-deleted posts and comments.
pub const DELETED_MARKER: &str = "[deleted]";

pub fn parse_object_id(raw: &str, label: &str) -> Result<ObjectId, ForumError> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| ForumError::InvalidArgument(format!("Invalid {} ID", label)))
}

/// Trim a required text field and enforce its length limit (in characters).
pub fn required_text(field: &str, value: &str, max_len: usize) -> Result<String, ForumError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ForumError::InvalidArgument(format!(
            "{} cannot be empty",
            field
        )));
    }
    if trimmed.chars().count() > max_len {
        return Err(ForumError::InvalidArgument(format!(
            "{} cannot exceed {} characters",
            field, max_len
        )));
    }
    Ok(trimmed.to_string())
}

pub fn optional_text(
    field: &str,
    value: Option<&str>,
    max_len: usize,
) -> Result<Option<String>, ForumError> {
    value.map(|v| required_text(field, v, max_len)).transpose()
}

/// Tags are stored trimmed, lowercase and without duplicates.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}
