//! PostgreSQL store
//!
//! Every mutating operation runs inside one transaction. Relationships are
//! kept in the explicit `post_tags` join table and deletions cascade through
//! explicit statements rather than `ON DELETE CASCADE`.

use async_trait::async_trait;
use common::database::run_migrations;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};
use std::collections::{HashMap, HashSet};
use tracing::info;

use super::{BlogStore, StoreError, StoreResult};
use crate::filters::{PostFilter, TagFilter, escape_like};
use crate::models::post::{slugify_title, unique_slug};
use crate::models::{NewPost, NewUser, Post, PostChanges, PostStatus, Tag, UpdateUser, User};
use crate::reconcile::{TagLinks, TagMode, reconcile};

/// Embedded schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const USER_COLUMNS: &str =
    "id, email, name, password_hash, is_active, is_staff, is_superuser, created_at";
const SLUG_TAKEN: &str = "Slug must be unique for the creation date.";
const POST_COLUMNS: &str = "p.id, p.title, p.slug, p.user_id, p.content, p.read_time_min, \
     p.status, p.keywords, p.image, p.created_at, p.updated_at";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return match db_err.constraint() {
                    Some("users_email_key") => {
                        StoreError::conflict("email", "user with this email already exists.")
                    }
                    Some("tags_user_name_key") => {
                        StoreError::conflict("name", "Tag with this name already exists.")
                    }
                    Some("posts_slug_created_date_key") => {
                        StoreError::conflict("slug", SLUG_TAKEN)
                    }
                    _ => StoreError::conflict("non_field_errors", db_err.message().to_string()),
                };
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::NotFound("user");
            }
        }
        StoreError::Database(DatabaseError::Query(err))
    }
}

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an initialized pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> DatabaseResult<()> {
        run_migrations(&self.pool, &MIGRATOR).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Tag operations bound to an open transaction
struct PgTagLinks<'c> {
    conn: &'c mut PgConnection,
}

impl TagLinks for PgTagLinks<'_> {
    async fn find_or_create(&mut self, owner: i64, name: &str) -> StoreResult<Tag> {
        // The no-op update makes RETURNING yield the row on conflict too
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (name, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, user_id
            "#,
        )
        .bind(name)
        .bind(owner)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(tag)
    }

    async fn attach(&mut self, post_id: i64, tag_id: i64) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(tag_id)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    async fn detach_all(&mut self, post_id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }
}

fn post_from_row(row: &PgRow) -> StoreResult<Post> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<PostStatus>()
        .map_err(|e: String| sqlx::Error::Decode(e.into()))?;

    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        by: row.try_get("user_id")?,
        content: row.try_get("content")?,
        read_time_min: row.try_get("read_time_min")?,
        status,
        keywords: row.try_get("keywords")?,
        image: row.try_get("image")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        tags: Vec::new(),
    })
}

/// Fill in the tags of `posts` with one query
async fn load_tags(conn: &mut PgConnection, posts: &mut [Post]) -> StoreResult<()> {
    if posts.is_empty() {
        return Ok(());
    }

    let ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
    let rows = sqlx::query(
        r#"
        SELECT pt.post_id, t.id, t.name, t.user_id
        FROM post_tags pt
        JOIN tags t ON t.id = pt.tag_id
        WHERE pt.post_id = ANY($1)
        ORDER BY t.id
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_post: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in rows {
        by_post
            .entry(row.try_get("post_id")?)
            .or_default()
            .push(Tag {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                user_id: row.try_get("user_id")?,
            });
    }

    for post in posts.iter_mut() {
        post.tags = by_post.remove(&post.id).unwrap_or_default();
    }

    Ok(())
}

async fn fetch_post(conn: &mut PgConnection, id: i64) -> StoreResult<Option<Post>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts p WHERE p.id = $1", POST_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut posts = [post_from_row(&row)?];
    load_tags(conn, &mut posts).await?;
    let [post] = posts;
    Ok(Some(post))
}

/// Slugs already used by posts created today that could collide with `base`
async fn taken_slugs(conn: &mut PgConnection, base: &str) -> StoreResult<HashSet<String>> {
    let rows = sqlx::query(
        r#"
        SELECT slug FROM posts
        WHERE (created_at AT TIME ZONE 'UTC')::date = (NOW() AT TIME ZONE 'UTC')::date
          AND (slug = $1 OR slug LIKE $2)
        "#,
    )
    .bind(base)
    .bind(format!("{}-%", escape_like(base)))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("slug").map_err(StoreError::from))
        .collect()
}

#[async_trait]
impl BlogStore for PgStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        info!("Creating new user: {}", new_user.email);

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, password_hash, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .bind(new_user.is_staff)
        .bind(new_user.is_superuser)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user(&self, id: i64, changes: UpdateUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                password_hash = COALESCE($3, password_hash)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or(StoreError::NotFound("user"))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM post_tags
            WHERE post_id IN (SELECT id FROM posts WHERE user_id = $1)
               OR tag_id IN (SELECT id FROM tags WHERE user_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM posts WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM tags WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }

        tx.commit().await?;
        info!("Deleted user {} with their posts and tags", id);
        Ok(())
    }

    async fn list_posts(&self, filter: &PostFilter) -> StoreResult<Vec<Post>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM posts p WHERE TRUE",
            POST_COLUMNS
        ));

        // EXISTS keeps a post matching several tags from appearing twice
        if let Some(tag_ids) = &filter.tag_ids {
            query.push(
                " AND EXISTS (SELECT 1 FROM post_tags pt WHERE pt.post_id = p.id AND pt.tag_id = ANY(",
            );
            query.push_bind(tag_ids.clone());
            query.push("))");
        }
        if let Some(search) = &filter.search {
            query.push(" AND p.keywords ILIKE ");
            query.push_bind(format!("%{}%", escape_like(search)));
        }
        query.push(" ORDER BY p.id DESC");

        // Both reads share one snapshot
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let rows = query.build().fetch_all(&mut *tx).await?;
        let mut posts = rows
            .iter()
            .map(post_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        load_tags(&mut tx, &mut posts).await?;

        tx.commit().await?;
        Ok(posts)
    }

    async fn find_post(&self, id: i64) -> StoreResult<Option<Post>> {
        let mut conn = self.pool.acquire().await?;
        fetch_post(&mut conn, id).await
    }

    async fn create_post(
        &self,
        owner: i64,
        new_post: NewPost,
        tag_names: Vec<String>,
    ) -> StoreResult<Post> {
        let mut tx = self.pool.begin().await?;

        let slug = match new_post.slug {
            Some(slug) => {
                if taken_slugs(&mut tx, &slug).await?.contains(&slug) {
                    return Err(StoreError::conflict("slug", SLUG_TAKEN));
                }
                slug
            }
            None => {
                let base = slugify_title(&new_post.title);
                let taken = taken_slugs(&mut tx, &base).await?;
                unique_slug(&base, &taken)
            }
        };

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO posts (title, slug, user_id, content, read_time_min, status, keywords)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&new_post.title)
        .bind(&slug)
        .bind(owner)
        .bind(&new_post.content)
        .bind(new_post.read_time_min)
        .bind(new_post.status.as_str())
        .bind(&new_post.keywords)
        .fetch_one(&mut *tx)
        .await?;

        let mut links = PgTagLinks { conn: &mut tx };
        reconcile(&mut links, id, owner, &tag_names, TagMode::Append).await?;

        let post = fetch_post(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound("post"))?;

        tx.commit().await?;
        info!("Created post {} for user {}", id, owner);
        Ok(post)
    }

    async fn update_post(
        &self,
        id: i64,
        changes: PostChanges,
        tag_names: Option<Vec<String>>,
    ) -> StoreResult<Post> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                read_time_min = COALESCE($4, read_time_min),
                status = COALESCE($5, status),
                keywords = COALESCE($6, keywords),
                updated_at = NOW()
            WHERE id = $1
            RETURNING user_id
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.content)
        .bind(changes.read_time_min)
        .bind(changes.status.map(|status| status.as_str()))
        .bind(changes.keywords)
        .fetch_optional(&mut *tx)
        .await?;

        let owner = owner.ok_or(StoreError::NotFound("post"))?;

        if let Some(names) = tag_names {
            let mut links = PgTagLinks { conn: &mut tx };
            reconcile(&mut links, id, owner, &names, TagMode::Replace).await?;
        }

        let post = fetch_post(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound("post"))?;

        tx.commit().await?;
        info!("Updated post {}", id);
        Ok(post)
    }

    async fn set_post_image(&self, id: i64, image: &str) -> StoreResult<Post> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE posts SET image = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(image)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound("post"));
        }

        let post = fetch_post(&mut tx, id)
            .await?
            .ok_or(StoreError::NotFound("post"))?;

        tx.commit().await?;
        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound("post"));
        }

        tx.commit().await?;
        info!("Deleted post {}", id);
        Ok(())
    }

    async fn list_tags(&self, filter: &TagFilter) -> StoreResult<Vec<Tag>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT t.id, t.name, t.user_id FROM tags t");
        if filter.assigned_only {
            query.push(" WHERE EXISTS (SELECT 1 FROM post_tags pt WHERE pt.tag_id = t.id)");
        }
        query.push(" ORDER BY t.id DESC");

        let tags = query
            .build_query_as::<Tag>()
            .fetch_all(&self.pool)
            .await?;

        Ok(tags)
    }

    async fn find_tag(&self, id: i64) -> StoreResult<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name, user_id FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tag)
    }

    async fn create_tag(&self, owner: i64, name: &str) -> StoreResult<Tag> {
        let tag = sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (name, user_id) VALUES ($1, $2) RETURNING id, name, user_id",
        )
        .bind(name)
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        info!("Created tag {} for user {}", tag.id, owner);
        Ok(tag)
    }

    async fn rename_tag(&self, id: i64, name: &str) -> StoreResult<Tag> {
        let tag = sqlx::query_as::<_, Tag>(
            "UPDATE tags SET name = $2 WHERE id = $1 RETURNING id, name, user_id",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        tag.ok_or(StoreError::NotFound("tag"))
    }

    async fn delete_tag(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM post_tags WHERE tag_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound("tag"));
        }

        tx.commit().await?;
        info!("Deleted tag {}", id);
        Ok(())
    }
}
