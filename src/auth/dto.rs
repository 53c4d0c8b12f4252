use serde::{Deserialize, Serialize};

use super::password::Password;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: Password,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogoutResponse {
    pub success: bool,
    pub revoked: bool,
}
