use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{LoginRequest, LogoutResponse, TokenResponse},
    extractors::AuthUser,
    services,
    sessions::Revocation,
};
use crate::{error::AppResult, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let Json(payload) = payload?;
    let access_token = services::login(&state, payload, state.deadline()).await?;
    Ok(Json(TokenResponse { access_token }))
}

#[instrument(skip(state, identity), fields(user_id = %identity.user_id()))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> AppResult<Json<LogoutResponse>> {
    let outcome = services::logout(&state, &identity, state.deadline()).await?;
    Ok(Json(LogoutResponse {
        success: true,
        revoked: outcome == Revocation::Revoked,
    }))
}
