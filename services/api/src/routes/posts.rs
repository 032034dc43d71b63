//! Post endpoints

use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::MultipartRejection,
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use crate::{
    auth::RequestContext,
    error::{ApiError, ApiResult},
    extract::{AppJson, AppPath, AppQuery},
    filters::{PostFilter, PostQuery},
    models::{Post, PostChanges, PostDetail, PostImageResponse, PostPayload, PostSummary},
    policy::Action,
    state::AppState,
    validation::ValidationErrors,
};

/// Load a post or fail with 404
async fn existing_post(state: &AppState, id: i64) -> ApiResult<Post> {
    state.store.find_post(id).await?.ok_or(ApiError::NotFound)
}

/// List posts, optionally filtered by tag ids and keywords
pub async fn list_posts(
    State(state): State<AppState>,
    ctx: RequestContext,
    query: Result<AppQuery<PostQuery>, ApiError>,
) -> ApiResult<Json<Vec<PostSummary>>> {
    ctx.authorize(Action::List)?;
    let AppQuery(query) = query?;
    let filter = PostFilter::from_query(&query)?;

    let posts = state.store.list_posts(&filter).await?;
    Ok(Json(posts.iter().map(PostSummary::from).collect()))
}

/// Create a post owned by the caller
pub async fn create_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<AppJson<PostPayload>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let user = ctx.authorize(Action::Create)?.require_user()?;
    let AppJson(payload) = payload?;
    let (new_post, tags) = payload.into_new_post()?;

    let post = state.store.create_post(user.id, new_post, tags).await?;
    info!("User {} created post {}", user.id, post.id);

    Ok((StatusCode::CREATED, Json(PostDetail::from(&post))))
}

/// Get a post with its content
pub async fn get_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    AppPath(id): AppPath<i64>,
) -> ApiResult<Json<PostDetail>> {
    ctx.authorize(Action::Retrieve)?;
    let post = existing_post(&state, id).await?;
    Ok(Json(PostDetail::from(&post)))
}

/// Replace a post; tags are only touched when the payload carries them
pub async fn update_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<AppPath<i64>, ApiError>,
    payload: Result<AppJson<PostPayload>, ApiError>,
) -> ApiResult<Json<PostDetail>> {
    ctx.authorize(Action::Update)?;
    let AppPath(id) = id?;
    existing_post(&state, id).await?;

    let AppJson(payload) = payload?;
    let tags_supplied = payload.tags.is_some();
    let (new_post, tags) = payload.into_new_post()?;

    let post = state
        .store
        .update_post(id, PostChanges::from(new_post), tags_supplied.then_some(tags))
        .await?;
    info!("Updated post {}", post.id);

    Ok(Json(PostDetail::from(&post)))
}

/// Update a subset of a post's fields
pub async fn partial_update_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<AppPath<i64>, ApiError>,
    payload: Result<AppJson<PostPayload>, ApiError>,
) -> ApiResult<Json<PostDetail>> {
    ctx.authorize(Action::PartialUpdate)?;
    let AppPath(id) = id?;
    existing_post(&state, id).await?;

    let AppJson(payload) = payload?;
    let (changes, tags) = payload.into_changes()?;

    let post = state.store.update_post(id, changes, tags).await?;
    info!("Updated post {}", post.id);

    Ok(Json(PostDetail::from(&post)))
}

/// Delete a post
pub async fn delete_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<AppPath<i64>, ApiError>,
) -> ApiResult<StatusCode> {
    ctx.authorize(Action::Destroy)?;
    let AppPath(id) = id?;
    state.store.delete_post(id).await?;
    info!("Deleted post {}", id);

    Ok(StatusCode::NO_CONTENT)
}

/// Attach an image to a post from the multipart field `image`
pub async fn upload_image(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<AppPath<i64>, ApiError>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PostImageResponse>> {
    ctx.authorize(Action::UploadImage)?;
    let AppPath(id) = id?;
    existing_post(&state, id).await?;

    let mut multipart = multipart?;
    let mut content = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        if content.is_some() {
            return Err(ValidationErrors::single("image", "Submit exactly one image.").into());
        }
        content = Some(field.bytes().await?);
    }

    let content = content
        .ok_or_else(|| ValidationErrors::single("image", "No file was submitted."))?;

    let image = state.media.store_post_image(content).await?;
    let post = state.store.set_post_image(id, &image).await?;

    Ok(Json(PostImageResponse {
        id: post.id,
        image: post.image,
    }))
}
