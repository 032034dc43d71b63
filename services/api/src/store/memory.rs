//! In-process store
//!
//! All state sits behind one async mutex; holding the guard for the whole
//! operation gives each call the same all-or-nothing behaviour a database
//! transaction gives [`super::PgStore`].

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::{BlogStore, StoreError, StoreResult};
use crate::filters::{PostFilter, TagFilter};
use crate::models::post::{slugify_title, unique_slug};
use crate::models::{NewPost, NewUser, Post, PostChanges, Tag, UpdateUser, User};
use crate::reconcile::{TagLinks, TagMode, reconcile};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    /// Posts are stored without their tags; see `hydrate`
    posts: BTreeMap<i64, Post>,
    tags: BTreeMap<i64, Tag>,
    /// `(post_id, tag_id)` join rows
    post_tags: BTreeSet<(i64, i64)>,
    next_user_id: i64,
    next_post_id: i64,
    next_tag_id: i64,
}

impl MemoryState {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn hydrate(&self, post: &Post) -> Post {
        let mut post = post.clone();
        post.tags = self
            .post_tags
            .iter()
            .filter(|(post_id, _)| *post_id == post.id)
            .filter_map(|(_, tag_id)| self.tags.get(tag_id).cloned())
            .collect();
        post
    }

    fn post(&self, id: i64) -> StoreResult<Post> {
        self.posts
            .get(&id)
            .map(|post| self.hydrate(post))
            .ok_or(StoreError::NotFound("post"))
    }

    fn name_taken(&self, owner: i64, name: &str, except: Option<i64>) -> bool {
        self.tags
            .values()
            .any(|tag| tag.user_id == owner && tag.name == name && Some(tag.id) != except)
    }

    fn detach_post(&mut self, post_id: i64) {
        self.post_tags.retain(|(post, _)| *post != post_id);
    }

    fn detach_tag(&mut self, tag_id: i64) {
        self.post_tags.retain(|(_, tag)| *tag != tag_id);
    }
}

impl TagLinks for MemoryState {
    async fn find_or_create(&mut self, owner: i64, name: &str) -> StoreResult<Tag> {
        if let Some(tag) = self
            .tags
            .values()
            .find(|tag| tag.user_id == owner && tag.name == name)
        {
            return Ok(tag.clone());
        }

        let tag = Tag {
            id: Self::next_id(&mut self.next_tag_id),
            name: name.to_string(),
            user_id: owner,
        };
        self.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn attach(&mut self, post_id: i64, tag_id: i64) -> StoreResult<()> {
        self.post_tags.insert((post_id, tag_id));
        Ok(())
    }

    async fn detach_all(&mut self, post_id: i64) -> StoreResult<()> {
        self.detach_post(post_id);
        Ok(())
    }
}

/// Store keeping every row in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlogStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|user| user.email == new_user.email) {
            return Err(StoreError::conflict(
                "email",
                "user with this email already exists.",
            ));
        }

        let user = User {
            id: MemoryState::next_id(&mut state.next_user_id),
            email: new_user.email,
            name: new_user.name,
            password_hash: new_user.password_hash,
            is_active: true,
            is_staff: new_user.is_staff,
            is_superuser: new_user.is_superuser,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());

        info!("Created user {}", user.id);
        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }

    async fn update_user(&self, id: i64, changes: UpdateUser) -> StoreResult<User> {
        let mut state = self.state.lock().await;
        let user = state.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;

        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }

        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.users.remove(&id).is_none() {
            return Err(StoreError::NotFound("user"));
        }

        let posts: Vec<i64> = state
            .posts
            .values()
            .filter(|post| post.by == id)
            .map(|post| post.id)
            .collect();
        for post_id in posts {
            state.detach_post(post_id);
            state.posts.remove(&post_id);
        }

        let tags: Vec<i64> = state
            .tags
            .values()
            .filter(|tag| tag.user_id == id)
            .map(|tag| tag.id)
            .collect();
        for tag_id in tags {
            state.detach_tag(tag_id);
            state.tags.remove(&tag_id);
        }

        info!("Deleted user {} with their posts and tags", id);
        Ok(())
    }

    async fn list_posts(&self, filter: &PostFilter) -> StoreResult<Vec<Post>> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .values()
            .rev()
            .map(|post| state.hydrate(post))
            .filter(|post| filter.matches(post))
            .collect())
    }

    async fn find_post(&self, id: i64) -> StoreResult<Option<Post>> {
        let state = self.state.lock().await;
        Ok(state.posts.get(&id).map(|post| state.hydrate(post)))
    }

    async fn create_post(
        &self,
        owner: i64,
        new_post: NewPost,
        tag_names: Vec<String>,
    ) -> StoreResult<Post> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&owner) {
            return Err(StoreError::NotFound("user"));
        }

        let now = Utc::now();
        let taken: HashSet<String> = state
            .posts
            .values()
            .filter(|post| post.created_at.date_naive() == now.date_naive())
            .map(|post| post.slug.clone())
            .collect();

        let slug = match new_post.slug {
            Some(slug) if taken.contains(&slug) => {
                return Err(StoreError::conflict(
                    "slug",
                    "Slug must be unique for the creation date.",
                ));
            }
            Some(slug) => slug,
            None => unique_slug(&slugify_title(&new_post.title), &taken),
        };

        let post = Post {
            id: MemoryState::next_id(&mut state.next_post_id),
            title: new_post.title,
            slug,
            by: owner,
            content: new_post.content,
            read_time_min: new_post.read_time_min,
            status: new_post.status,
            keywords: new_post.keywords,
            image: None,
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
        };
        state.posts.insert(post.id, post.clone());

        reconcile(&mut *state, post.id, owner, &tag_names, TagMode::Append).await?;

        info!("Created post {} for user {}", post.id, owner);
        state.post(post.id)
    }

    async fn update_post(
        &self,
        id: i64,
        changes: PostChanges,
        tag_names: Option<Vec<String>>,
    ) -> StoreResult<Post> {
        let mut state = self.state.lock().await;
        let post = state.posts.get_mut(&id).ok_or(StoreError::NotFound("post"))?;

        changes.apply(post);
        post.updated_at = Utc::now();
        let owner = post.by;

        if let Some(names) = tag_names {
            reconcile(&mut *state, id, owner, &names, TagMode::Replace).await?;
        }

        info!("Updated post {}", id);
        state.post(id)
    }

    async fn set_post_image(&self, id: i64, image: &str) -> StoreResult<Post> {
        let mut state = self.state.lock().await;
        let post = state.posts.get_mut(&id).ok_or(StoreError::NotFound("post"))?;

        post.image = Some(image.to_string());
        post.updated_at = Utc::now();

        state.post(id)
    }

    async fn delete_post(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.posts.remove(&id).is_none() {
            return Err(StoreError::NotFound("post"));
        }
        state.detach_post(id);

        info!("Deleted post {}", id);
        Ok(())
    }

    async fn list_tags(&self, filter: &TagFilter) -> StoreResult<Vec<Tag>> {
        let state = self.state.lock().await;
        let assigned: HashSet<i64> = state.post_tags.iter().map(|(_, tag)| *tag).collect();

        Ok(state
            .tags
            .values()
            .rev()
            .filter(|tag| !filter.assigned_only || assigned.contains(&tag.id))
            .cloned()
            .collect())
    }

    async fn find_tag(&self, id: i64) -> StoreResult<Option<Tag>> {
        Ok(self.state.lock().await.tags.get(&id).cloned())
    }

    async fn create_tag(&self, owner: i64, name: &str) -> StoreResult<Tag> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&owner) {
            return Err(StoreError::NotFound("user"));
        }
        if state.name_taken(owner, name, None) {
            return Err(StoreError::conflict(
                "name",
                "Tag with this name already exists.",
            ));
        }

        let tag = state.find_or_create(owner, name).await?;
        info!("Created tag {} for user {}", tag.id, owner);
        Ok(tag)
    }

    async fn rename_tag(&self, id: i64, name: &str) -> StoreResult<Tag> {
        let mut state = self.state.lock().await;
        let owner = state
            .tags
            .get(&id)
            .map(|tag| tag.user_id)
            .ok_or(StoreError::NotFound("tag"))?;

        if state.name_taken(owner, name, Some(id)) {
            return Err(StoreError::conflict(
                "name",
                "Tag with this name already exists.",
            ));
        }

        let tag = state.tags.get_mut(&id).ok_or(StoreError::NotFound("tag"))?;
        tag.name = name.to_string();
        Ok(tag.clone())
    }

    async fn delete_tag(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.tags.remove(&id).is_none() {
            return Err(StoreError::NotFound("tag"));
        }
        state.detach_tag(id);

        info!("Deleted tag {}", id);
        Ok(())
    }
}
