//! API service routes

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{error::ApiError, state::AppState};

pub mod posts;
pub mod tags;
pub mod users;

/// Room for multipart boundaries and part headers on top of the file itself
const BODY_LIMIT_HEADROOM: usize = 64 * 1024;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.media.max_bytes() + BODY_LIMIT_HEADROOM;

    Router::new()
        .route("/health-check", get(health_check))
        .route(
            "/users/create",
            post(users::create_user).fallback(method_not_allowed),
        )
        .route(
            "/users/token",
            post(users::create_token).fallback(method_not_allowed),
        )
        .route(
            "/users/me",
            get(users::me)
                .patch(users::update_me)
                .put(users::update_me)
                .fallback(method_not_allowed),
        )
        .route(
            "/posts",
            get(posts::list_posts)
                .post(posts::create_post)
                .fallback(method_not_allowed),
        )
        .route(
            "/posts/:id",
            get(posts::get_post)
                .put(posts::update_post)
                .patch(posts::partial_update_post)
                .delete(posts::delete_post)
                .fallback(method_not_allowed),
        )
        .route(
            "/posts/:id/upload-image",
            post(posts::upload_image).fallback(method_not_allowed),
        )
        .route(
            "/tags",
            get(tags::list_tags)
                .post(tags::create_tag)
                .fallback(method_not_allowed),
        )
        .route(
            "/tags/:id",
            get(tags::get_tag)
                .put(tags::update_tag)
                .patch(tags::partial_update_tag)
                .delete(tags::delete_tag)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "blog-api"
    }))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
