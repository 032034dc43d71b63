//! Tag endpoints

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use crate::{
    auth::RequestContext,
    error::{ApiError, ApiResult},
    extract::{AppJson, AppPath, AppQuery},
    filters::{TagFilter, TagQuery},
    models::{Tag, TagPayload, TagResponse},
    policy::Action,
    state::AppState,
    validation::{REQUIRED, ValidationErrors, validate_tag_name},
};

/// Validate a submitted tag name; `required` is false for partial updates
fn tag_name(payload: &TagPayload, required: bool) -> Result<Option<String>, ValidationErrors> {
    match &payload.name {
        Some(name) => {
            validate_tag_name(name).map_err(|message| ValidationErrors::single("name", message))?;
            Ok(Some(name.clone()))
        }
        None if required => Err(ValidationErrors::single("name", REQUIRED)),
        None => Ok(None),
    }
}

async fn existing_tag(state: &AppState, id: i64) -> ApiResult<Tag> {
    state.store.find_tag(id).await?.ok_or(ApiError::NotFound)
}

/// List tags, optionally only those attached to a post
pub async fn list_tags(
    State(state): State<AppState>,
    ctx: RequestContext,
    query: Result<AppQuery<TagQuery>, ApiError>,
) -> ApiResult<Json<Vec<TagResponse>>> {
    ctx.authorize(Action::List)?;
    let AppQuery(query) = query?;
    let filter = TagFilter::from_query(&query)?;

    let tags = state.store.list_tags(&filter).await?;
    Ok(Json(tags.iter().map(TagResponse::from).collect()))
}

pub async fn get_tag(
    State(state): State<AppState>,
    ctx: RequestContext,
    AppPath(id): AppPath<i64>,
) -> ApiResult<Json<TagResponse>> {
    ctx.authorize(Action::Retrieve)?;
    let tag = existing_tag(&state, id).await?;
    Ok(Json(TagResponse::from(&tag)))
}

/// Create a tag owned by the caller
pub async fn create_tag(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<AppJson<TagPayload>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let user = ctx.authorize(Action::Create)?.require_user()?;
    let AppJson(payload) = payload?;
    let name = tag_name(&payload, true)?.unwrap_or_default();

    let tag = state.store.create_tag(user.id, &name).await?;
    info!("User {} created tag {}", user.id, tag.id);

    Ok((StatusCode::CREATED, Json(TagResponse::from(&tag))))
}

async fn rename(
    state: &AppState,
    ctx: &RequestContext,
    action: Action,
    id: Result<AppPath<i64>, ApiError>,
    payload: Result<AppJson<TagPayload>, ApiError>,
) -> ApiResult<Json<TagResponse>> {
    ctx.authorize(action)?;
    let AppPath(id) = id?;
    let tag = existing_tag(state, id).await?;

    let AppJson(payload) = payload?;
    let tag = match tag_name(&payload, action == Action::Update)? {
        Some(name) => state.store.rename_tag(id, &name).await?,
        None => tag,
    };

    Ok(Json(TagResponse::from(&tag)))
}

/// Rename a tag
pub async fn update_tag(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<AppPath<i64>, ApiError>,
    payload: Result<AppJson<TagPayload>, ApiError>,
) -> ApiResult<Json<TagResponse>> {
    rename(&state, &ctx, Action::Update, id, payload).await
}

/// Rename a tag; an empty payload leaves it unchanged
pub async fn partial_update_tag(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<AppPath<i64>, ApiError>,
    payload: Result<AppJson<TagPayload>, ApiError>,
) -> ApiResult<Json<TagResponse>> {
    rename(&state, &ctx, Action::PartialUpdate, id, payload).await
}

pub async fn delete_tag(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: Result<AppPath<i64>, ApiError>,
) -> ApiResult<StatusCode> {
    ctx.authorize(Action::Destroy)?;
    let AppPath(id) = id?;
    state.store.delete_tag(id).await?;
    info!("Deleted tag {}", id);

    Ok(StatusCode::NO_CONTENT)
}
