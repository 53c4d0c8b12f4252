use std::fmt;

use uuid::Uuid;
use zeroize::Zeroizing;

/// Raw bearer token of the current session; wiped on drop, never printed.
#[derive(Clone)]
pub struct SessionToken(Zeroizing<String>);

impl SessionToken {
    pub(crate) fn new(raw: &str) -> Self {
        Self(Zeroizing::new(raw.to_string()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Verified caller. Only the authenticator can mint one.
#[derive(Debug, Clone)]
pub struct Identity {
    user_id: Uuid,
    token: SessionToken,
}

impl Identity {
    pub(crate) fn new(user_id: Uuid, token: SessionToken) -> Self {
        Self { user_id, token }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }
}
