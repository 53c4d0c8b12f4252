use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::Claims;
use crate::config::JwtConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error("credential expired")]
    Expired,
    #[error("could not sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Issues and validates signed session tokens. Never touches storage.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl TokenService {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }

    pub fn issue(&self, email: &str) -> Result<String, TokenError> {
        self.issue_at(email, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, email: &str, now: OffsetDateTime) -> Result<String, TokenError> {
        let exp = now + self.ttl;
        let claims = Claims {
            sub: email.to_string(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;
        debug!(jti = %claims.jti, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::InvalidCredential,
            }
        })?;
        debug!(jti = %data.claims.jti, "jwt verified");
        Ok(data.claims)
    }
}
