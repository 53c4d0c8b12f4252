use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload of a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // user email
    pub iat: i64,    // issued at (unix timestamp)
    pub exp: i64,    // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
    pub jti: Uuid,   // unique per issued token
}
