//! Post model, payloads and response shapes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, str::FromStr};

use crate::models::tag::{Tag, TagPayload, TagResponse};
use crate::validation::{
    REQUIRED, ValidationErrors, validate_read_time, validate_slug, validate_tag_name,
    validate_title,
};

pub const SLUG_MAX_LEN: usize = 250;

/// Publication status of a post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            other => Err(format!("\"{}\" is not a valid choice.", other)),
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post entity with its attached tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    /// Owning user, fixed at creation
    pub by: i64,
    pub content: String,
    pub read_time_min: i16,
    pub status: PostStatus,
    pub keywords: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

/// Validated post creation data
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    /// Explicit slug; derived from the title when absent
    pub slug: Option<String>,
    pub content: String,
    pub read_time_min: i16,
    pub status: PostStatus,
    pub keywords: String,
}

/// Validated post update data; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub read_time_min: Option<i16>,
    pub status: Option<PostStatus>,
    pub keywords: Option<String>,
}

impl PostChanges {
    pub fn apply(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
        if let Some(read_time_min) = self.read_time_min {
            post.read_time_min = read_time_min;
        }
        if let Some(status) = self.status {
            post.status = status;
        }
        if let Some(keywords) = &self.keywords {
            post.keywords = keywords.clone();
        }
    }
}

impl From<NewPost> for PostChanges {
    /// A full replacement; the slug is fixed at creation and is dropped
    fn from(new_post: NewPost) -> Self {
        Self {
            title: Some(new_post.title),
            content: Some(new_post.content),
            read_time_min: Some(new_post.read_time_min),
            status: Some(new_post.status),
            keywords: Some(new_post.keywords),
        }
    }
}

/// Post payload as submitted by clients
///
/// Unknown fields, including `by`, `id` and the timestamps, are dropped
/// during deserialization so they can never reach the store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostPayload {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub read_time_min: Option<i64>,
    pub status: Option<String>,
    pub keywords: Option<String>,
    pub tags: Option<Vec<TagPayload>>,
}

impl PostPayload {
    /// Validate a create (or full update) payload
    pub fn into_new_post(self) -> Result<(NewPost, Vec<String>), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let missing = [
            ("title", self.title.is_none()),
            ("content", self.content.is_none()),
            ("read_time_min", self.read_time_min.is_none()),
        ];
        for (field, _) in missing.iter().filter(|(_, absent)| *absent) {
            errors.add(field, REQUIRED);
        }
        if let Some(slug) = &self.slug {
            errors.check("slug", validate_slug(slug));
        }

        let (changes, tags) = self.validate_fields(errors)?;
        match (changes.title, changes.content, changes.read_time_min) {
            (Some(title), Some(content), Some(read_time_min)) => Ok((
                NewPost {
                    title,
                    slug: self.slug,
                    content,
                    read_time_min,
                    status: changes.status.unwrap_or_default(),
                    keywords: changes.keywords.unwrap_or_default(),
                },
                tags.unwrap_or_default(),
            )),
            _ => Err(ValidationErrors::single(
                "non_field_errors",
                "Title, content and read time are required.",
            )),
        }
    }

    /// Validate a partial update payload
    pub fn into_changes(self) -> Result<(PostChanges, Option<Vec<String>>), ValidationErrors> {
        let payload = Self { slug: None, ..self };
        payload.validate_fields(ValidationErrors::new())
    }

    fn validate_fields(
        &self,
        mut errors: ValidationErrors,
    ) -> Result<(PostChanges, Option<Vec<String>>), ValidationErrors> {
        if let Some(title) = &self.title {
            errors.check("title", validate_title(title));
        }

        let read_time_min = match self.read_time_min.map(validate_read_time) {
            Some(Ok(minutes)) => Some(minutes),
            Some(Err(message)) => {
                errors.add("read_time_min", message);
                None
            }
            None => None,
        };

        let status = match self.status.as_deref().map(str::parse::<PostStatus>) {
            Some(Ok(status)) => Some(status),
            Some(Err(message)) => {
                errors.add("status", message);
                None
            }
            None => None,
        };

        let tags = self.tags.as_ref().map(|tags| {
            tags.iter()
                .filter_map(|tag| match &tag.name {
                    Some(name) => {
                        errors.check("tags", validate_tag_name(name));
                        Some(name.clone())
                    }
                    None => {
                        errors.add("tags", "Each tag requires a name.");
                        None
                    }
                })
                .collect::<Vec<_>>()
        });

        errors.finish()?;

        Ok((
            PostChanges {
                title: self.title.clone(),
                content: self.content.clone(),
                read_time_min,
                status,
                keywords: self.keywords.clone(),
            },
            tags,
        ))
    }
}

/// Derive a slug from a post title
pub fn slugify_title(title: &str) -> String {
    let mut slug = slug::slugify(title);
    if slug.is_empty() {
        slug = "post".to_string();
    }
    slug.truncate(SLUG_MAX_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Pick the first free variant of `base` (`base`, `base-2`, `base-3`, ...)
pub fn unique_slug(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }

    (2..)
        .map(|n| {
            let suffix = format!("-{}", n);
            let mut stem = base.to_string();
            stem.truncate(SLUG_MAX_LEN - suffix.len());
            format!("{}{}", stem, suffix)
        })
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Post as shown in listings, without the body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub by: i64,
    pub read_time_min: i16,
    pub status: PostStatus,
    pub tags: Vec<TagResponse>,
    pub keywords: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            slug: post.slug.clone(),
            by: post.by,
            read_time_min: post.read_time_min,
            status: post.status,
            tags: post.tags.iter().map(TagResponse::from).collect(),
            keywords: post.keywords.clone(),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// Post as shown on its own, including body and image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub summary: PostSummary,
    pub content: String,
    pub image: Option<String>,
}

impl From<&Post> for PostDetail {
    fn from(post: &Post) -> Self {
        Self {
            summary: PostSummary::from(post),
            content: post.content.clone(),
            image: post.image.clone(),
        }
    }
}

/// Response of the image upload action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostImageResponse {
    pub id: i64,
    pub image: Option<String>,
}
