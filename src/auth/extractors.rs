use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::{debug, warn};

use super::{
    identity::{Identity, SessionToken},
    jwt::TokenService,
    sessions::SessionRegistry,
};
use crate::{db::Deadline, error::AppError, state::AppState};

/// Token part of a `Bearer <token>` header value.
///
/// The scheme is matched case-insensitively and must be followed by exactly one
/// space; the token must be non-empty and contain no whitespace.
pub(crate) fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// Turns the request's bearer credential into an [`Identity`].
///
/// Rejections, in the order they are checked: malformed header, invalid or
/// expired token, token not in the registry or bound to another email.
/// A storage failure while resolving the session denies the request.
pub async fn authenticate(
    tokens: &TokenService,
    sessions: &SessionRegistry,
    headers: &HeaderMap,
    deadline: Deadline,
) -> Result<Identity, AppError> {
    let mut values = headers.get_all(AUTHORIZATION).iter();
    let (Some(value), None) = (values.next(), values.next()) else {
        debug!("missing or repeated Authorization header");
        return Err(AppError::MissingOrMalformedCredential);
    };
    let token = value
        .to_str()
        .ok()
        .and_then(parse_bearer)
        .ok_or(AppError::MissingOrMalformedCredential)?;

    let claims = tokens.validate(token).map_err(|e| {
        warn!(error = %e, "token rejected");
        AppError::InvalidOrExpiredCredential
    })?;

    let user = sessions
        .resolve(token, deadline)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| {
            warn!(jti = %claims.jti, "token has no active session");
            AppError::RevokedOrMismatchedCredential
        })?;
    if user.email != claims.sub {
        warn!(user_id = %user.id, jti = %claims.jti, "token subject does not match session owner");
        return Err(AppError::RevokedOrMismatchedCredential);
    }

    debug!(user_id = %user.id, "request authenticated");
    Ok(Identity::new(user.id, SessionToken::new(token)))
}

/// Extracts the verified caller; handlers taking it never run for rejected requests.
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(&state.tokens, &state.sessions, &parts.headers, state.deadline())
            .await
            .map(AuthUser)
    }
}
