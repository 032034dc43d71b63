//! Tag model and related payloads

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Tag entity, scoped to the user that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
}

/// Tag as submitted by clients, either standalone or nested in a post
#[derive(Debug, Clone, Deserialize)]
pub struct TagPayload {
    pub name: Option<String>,
}

/// Public view of a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResponse {
    pub id: i64,
    pub name: String,
}

impl From<&Tag> for TagResponse {
    fn from(tag: &Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name.clone(),
        }
    }
}
