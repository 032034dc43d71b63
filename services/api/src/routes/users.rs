//! User registration, token issuance and the `me` endpoint

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};

use crate::{
    accounts,
    auth::RequestContext,
    error::{ApiError, ApiResult},
    extract::AppJson,
    models::{
        CreateUserRequest, TokenRequest, TokenResponse, UpdateProfileRequest, UpdateUser,
        UserResponse,
    },
    password::hash_password,
    state::AppState,
    validation::{ValidationErrors, validate_name, validate_password},
};

/// Create a new user
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = accounts::create_user(
        state.store.as_ref(),
        &payload.email,
        &payload.password,
        &payload.name,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Exchange credentials for a token
pub async fn create_token(
    State(state): State<AppState>,
    AppJson(payload): AppJson<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = accounts::authenticate(state.store.as_ref(), &payload.email, &payload.password).await?;

    let token = state.jwt.issue(user.id).map_err(|e| {
        error!("Failed to issue token: {}", e);
        ApiError::InternalServerError
    })?;

    info!("Issued token for user {}", user.id);
    Ok(Json(TokenResponse { token }))
}

/// Get the authenticated user
pub async fn me(ctx: RequestContext) -> ApiResult<Json<UserResponse>> {
    let user = ctx.require_user()?;
    Ok(Json(UserResponse::from(user)))
}

/// Update the authenticated user's name and/or password
pub async fn update_me(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<AppJson<UpdateProfileRequest>, ApiError>,
) -> ApiResult<Json<UserResponse>> {
    let user = ctx.require_user()?;
    let AppJson(payload) = payload?;

    let mut errors = ValidationErrors::new();
    if let Some(name) = &payload.name {
        errors.check("name", validate_name(name));
    }
    if let Some(password) = &payload.password {
        errors.check("password", validate_password(password));
    }
    errors.finish()?;

    let password_hash = match &payload.password {
        Some(password) => Some(hash_password(password).await.map_err(|e| {
            error!("Failed to hash password: {}", e);
            ApiError::InternalServerError
        })?),
        None => None,
    };

    let updated = state
        .store
        .update_user(
            user.id,
            UpdateUser {
                name: payload.name,
                password_hash,
            },
        )
        .await?;

    Ok(Json(UserResponse::from(&updated)))
}
