use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    dto::{ChangePasswordRequest, RegisterRequest},
    repo_types::{NewUser, User},
};
use crate::{
    auth::{identity::Identity, password::Password},
    db::{Deadline, StoreError},
    error::{AppError, AppResult},
    state::AppState,
};

const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;
pub(crate) const DEFAULT_TIMEZONE: &str = "UTC";

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.len() <= MAX_EMAIL_LEN && EMAIL_RE.is_match(email)
}

/// `UTC` or an IANA-style `Area/Location[/Sub]` name.
pub(crate) fn is_valid_timezone(tz: &str) -> bool {
    lazy_static! {
        static ref TZ_RE: Regex =
            Regex::new(r"^(UTC|[A-Z][A-Za-z_]+(/[A-Za-z0-9][A-Za-z0-9_+\-]*){1,2})$").unwrap();
    }
    tz.len() <= 64 && TZ_RE.is_match(tz)
}

fn check_new_password(password: &Password) -> AppResult<()> {
    if password.char_count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub async fn register(state: &AppState, req: RegisterRequest, deadline: Deadline) -> AppResult<User> {
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        warn!("registration with invalid email");
        return Err(AppError::BadRequest("invalid email".into()));
    }
    check_new_password(&req.password)?;

    let timezone = req
        .timezone
        .map(|tz| tz.trim().to_string())
        .filter(|tz| !tz.is_empty())
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    if !is_valid_timezone(&timezone) {
        return Err(AppError::BadRequest("invalid timezone".into()));
    }

    let password_hash = state
        .hasher
        .hash_blocking(req.password)
        .await
        .map_err(AppError::unknown)?;

    let user = deadline
        .run(state.users.create(NewUser {
            email,
            password_hash,
            timezone,
        }))
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(_) => AppError::Conflict("email already registered".into()),
            other => other.into(),
        })?;

    info!(user_id = %user.id, "user registered");
    Ok(user)
}

pub async fn profile(state: &AppState, identity: &Identity, deadline: Deadline) -> AppResult<User> {
    deadline
        .run(state.users.find_by_id(identity.user_id()))
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))
}

pub async fn update_timezone(
    state: &AppState,
    identity: &Identity,
    timezone: &str,
    deadline: Deadline,
) -> AppResult<User> {
    let timezone = timezone.trim();
    if !is_valid_timezone(timezone) {
        return Err(AppError::BadRequest("invalid timezone".into()));
    }
    let user = deadline
        .run(state.users.update_timezone(identity.user_id(), timezone))
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;
    info!(user_id = %user.id, timezone = %user.timezone, "timezone updated");
    Ok(user)
}

/// Replaces the password hash and drops every session of the user.
pub async fn change_password(
    state: &AppState,
    identity: &Identity,
    req: ChangePasswordRequest,
    deadline: Deadline,
) -> AppResult<()> {
    check_new_password(&req.new_password)?;
    let user = profile(state, identity, deadline).await?;

    let ok = state
        .hasher
        .verify_blocking(req.current_password, user.password_hash)
        .await
        .map_err(AppError::unknown)?;
    if !ok {
        warn!(user_id = %user.id, "password change with wrong current password");
        return Err(AppError::BadRequest("current password is incorrect".into()));
    }

    let hash = state
        .hasher
        .hash_blocking(req.new_password)
        .await
        .map_err(AppError::unknown)?;
    if !deadline
        .run(state.users.update_password_hash(user.id, &hash))
        .await?
    {
        return Err(AppError::NotFound("user not found".into()));
    }
    state.sessions.revoke_all(user.id, deadline).await?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}
