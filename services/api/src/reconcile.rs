//! Tag reconciliation for post writes
//!
//! Submitted tag names are resolved, in submission order, to the tag rows
//! owned by the post owner. Missing rows are created; existing ones are
//! reused, so repeating a name never yields a second row.

use std::collections::HashSet;
use std::future::Future;

use crate::models::Tag;
use crate::store::StoreResult;

/// How resolved tags are applied to the post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMode {
    /// Attach on top of whatever the post already carries
    Append,
    /// Detach everything first
    Replace,
}

/// Tag operations a store exposes inside its unit of work
pub trait TagLinks: Send {
    /// Find the `(owner, name)` tag or create it; must be race free
    fn find_or_create(
        &mut self,
        owner: i64,
        name: &str,
    ) -> impl Future<Output = StoreResult<Tag>> + Send;

    /// Link a tag to a post; linking twice is a no-op
    fn attach(&mut self, post_id: i64, tag_id: i64) -> impl Future<Output = StoreResult<()>> + Send;

    /// Unlink every tag from a post
    fn detach_all(&mut self, post_id: i64) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Resolve `names` for `owner` and apply them to `post_id`
///
/// Returns the resolved tags, deduplicated, in first-submission order.
pub async fn reconcile<L: TagLinks>(
    links: &mut L,
    post_id: i64,
    owner: i64,
    names: &[String],
    mode: TagMode,
) -> StoreResult<Vec<Tag>> {
    if mode == TagMode::Replace {
        links.detach_all(post_id).await?;
    }

    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            continue;
        }
        let tag = links.find_or_create(owner, name).await?;
        links.attach(post_id, tag.id).await?;
        resolved.push(tag);
    }

    Ok(resolved)
}
