use std::collections::HashMap;

use axum::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo::UserStore,
    repo_types::{NewUser, User},
};
use crate::db::StoreError;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tokens: HashMap<String, Uuid>,
}

/// Process-local credential store for `APP_STORE=memory` and tests.
#[derive(Default)]
pub struct MemoryUserStore {
    tables: RwLock<Tables>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("users_email_key".into()));
        }
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            timezone: user.timezone,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.tokens.get(token).and_then(|id| t.users.get(id)).cloned())
    }

    async fn update_timezone(&self, id: Uuid, timezone: &str) -> Result<Option<User>, StoreError> {
        let mut t = self.tables.write().await;
        Ok(t.users.get_mut(&id).map(|u| {
            u.timezone = timezone.to_string();
            u.clone()
        }))
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<bool, StoreError> {
        let mut t = self.tables.write().await;
        match t.users.get_mut(&id) {
            Some(u) => {
                u.password_hash = hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError> {
        let mut t = self.tables.write().await;
        if t.tokens.contains_key(token) {
            return Err(StoreError::Duplicate("tokens_pkey".into()));
        }
        t.tokens.insert(token.to_string(), user_id);
        Ok(())
    }

    async fn delete_token(&self, user_id: Uuid, token: &str) -> Result<u64, StoreError> {
        let mut t = self.tables.write().await;
        if t.tokens.get(token) == Some(&user_id) {
            t.tokens.remove(token);
            return Ok(1);
        }
        Ok(0)
    }

    async fn delete_tokens_for(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut t = self.tables.write().await;
        let before = t.tokens.len();
        t.tokens.retain(|_, owner| *owner != user_id);
        Ok((before - t.tokens.len()) as u64)
    }
}

/// Store whose every call fails as if the database were unreachable.
#[cfg(test)]
pub(crate) struct UnavailableUserStore;

#[cfg(test)]
#[async_trait]
impl UserStore for UnavailableUserStore {
    async fn create(&self, _user: NewUser) -> Result<User, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn find_by_token(&self, _token: &str) -> Result<Option<User>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn update_timezone(&self, _id: Uuid, _tz: &str) -> Result<Option<User>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn update_password_hash(&self, _id: Uuid, _hash: &str) -> Result<bool, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn insert_token(&self, _user_id: Uuid, _token: &str) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn delete_token(&self, _user_id: Uuid, _token: &str) -> Result<u64, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn delete_tokens_for(&self, _user_id: Uuid) -> Result<u64, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}
