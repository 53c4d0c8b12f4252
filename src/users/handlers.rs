use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{ChangePasswordRequest, PublicUser, RegisterRequest, UpdateProfileRequest},
    services,
};
use crate::{auth::extractors::AuthUser, error::AppResult, state::AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/me", put(update_profile))
        .route("/users/me/password", put(change_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let Json(payload) = payload?;
    let user = services::register(&state, payload, state.deadline()).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, identity), fields(user_id = %identity.user_id()))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = services::profile(&state, &identity, state.deadline()).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, identity, payload), fields(user_id = %identity.user_id()))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> AppResult<Json<PublicUser>> {
    let Json(payload) = payload?;
    let user =
        services::update_timezone(&state, &identity, &payload.timezone, state.deadline()).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, identity, payload), fields(user_id = %identity.user_id()))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(payload) = payload?;
    services::change_password(&state, &identity, payload, state.deadline()).await?;
    Ok(StatusCode::NO_CONTENT)
}
