//! Data store for users, posts and tags
//!
//! [`BlogStore`] is the persistence seam of the service. [`PgStore`] backs
//! it with PostgreSQL; [`MemoryStore`] keeps everything in process and is
//! used by the test-suite and `serve --in-memory`.

use async_trait::async_trait;
use common::error::DatabaseError;
use thiserror::Error;

use crate::filters::{PostFilter, TagFilter};
use crate::models::{NewPost, NewUser, Post, PostChanges, Tag, UpdateUser, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors raised by store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique field already holds this value
    #[error("{field}: {message}")]
    Conflict { field: &'static str, message: String },

    /// The addressed row does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Database error
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl StoreError {
    pub fn conflict(field: &'static str, message: impl Into<String>) -> Self {
        StoreError::Conflict {
            field,
            message: message.into(),
        }
    }
}

/// Type alias for store results
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations; every mutating call is one atomic unit of work
#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User>;
    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, id: i64, changes: UpdateUser) -> StoreResult<User>;
    /// Delete a user together with the posts and tags they own
    async fn delete_user(&self, id: i64) -> StoreResult<()>;

    /// Matching posts, newest id first, each post once
    async fn list_posts(&self, filter: &PostFilter) -> StoreResult<Vec<Post>>;
    async fn find_post(&self, id: i64) -> StoreResult<Option<Post>>;
    /// Insert a post owned by `owner` and reconcile `tag_names` onto it
    async fn create_post(
        &self,
        owner: i64,
        new_post: NewPost,
        tag_names: Vec<String>,
    ) -> StoreResult<Post>;
    /// Apply `changes`; a supplied tag list replaces the post's tag set
    async fn update_post(
        &self,
        id: i64,
        changes: PostChanges,
        tag_names: Option<Vec<String>>,
    ) -> StoreResult<Post>;
    async fn set_post_image(&self, id: i64, image: &str) -> StoreResult<Post>;
    async fn delete_post(&self, id: i64) -> StoreResult<()>;

    /// Matching tags, newest id first, each tag once
    async fn list_tags(&self, filter: &TagFilter) -> StoreResult<Vec<Tag>>;
    async fn find_tag(&self, id: i64) -> StoreResult<Option<Tag>>;
    async fn create_tag(&self, owner: i64, name: &str) -> StoreResult<Tag>;
    async fn rename_tag(&self, id: i64, name: &str) -> StoreResult<Tag>;
    async fn delete_tag(&self, id: i64) -> StoreResult<()>;
}
