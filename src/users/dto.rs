use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::User;
use crate::auth::password::Password;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: Password,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Request body for profile update.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub timezone: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Password,
    pub new_password: Password,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub timezone: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            timezone: u.timezone,
        }
    }
}
