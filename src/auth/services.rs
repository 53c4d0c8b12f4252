use tracing::{info, warn};

use super::{
    dto::LoginRequest,
    identity::Identity,
    sessions::Revocation,
};
use crate::{
    db::Deadline,
    error::{AppError, AppResult},
    state::AppState,
    users::services::normalize_email,
};

const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Checks the credentials, then issues a token and records it as a session.
/// Unknown email and wrong password fail identically.
pub async fn login(state: &AppState, req: LoginRequest, deadline: Deadline) -> AppResult<String> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest("email and password are required".into()));
    }

    let Some(user) = deadline.run(state.users.find_by_email(&email)).await? else {
        warn!("login for unknown email");
        return Err(AppError::BadRequest(INVALID_CREDENTIALS.into()));
    };

    let ok = state
        .hasher
        .verify_blocking(req.password, user.password_hash.clone())
        .await
        .map_err(AppError::unknown)?;
    if !ok {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(AppError::BadRequest(INVALID_CREDENTIALS.into()));
    }

    let token = state.tokens.issue(&user.email).map_err(AppError::unknown)?;
    state.sessions.record(user.id, &token, deadline).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

/// Revokes the caller's own session. Revoking an already gone session is not an error.
pub async fn logout(state: &AppState, identity: &Identity, deadline: Deadline) -> AppResult<Revocation> {
    let outcome = state
        .sessions
        .revoke(identity.user_id(), identity.token().expose(), deadline)
        .await?;
    info!(user_id = %identity.user_id(), ?outcome, "user logged out");
    Ok(outcome)
}
