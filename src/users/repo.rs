use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, User};
use crate::db::StoreError;

/// Credential store: users and their issued tokens. No policy lives here.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_token(&self, token: &str) -> Result<Option<User>, StoreError>;
    async fn update_timezone(&self, id: Uuid, timezone: &str) -> Result<Option<User>, StoreError>;
    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<bool, StoreError>;
    async fn insert_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError>;
    async fn delete_token(&self, user_id: Uuid, token: &str) -> Result<u64, StoreError>;
    async fn delete_tokens_for(&self, user_id: Uuid) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, timezone)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, timezone, created_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.timezone)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, timezone, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, timezone, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.password_hash, u.timezone, u.created_at
            FROM users u
            JOIN tokens t ON t.user_id = u.id
            WHERE t.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn update_timezone(&self, id: Uuid, timezone: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET timezone = $1
            WHERE id = $2
            RETURNING id, email, password_hash, timezone, created_at
            "#,
        )
        .bind(timezone)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(hash)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn insert_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO tokens (token, user_id) VALUES ($1, $2)")
            .bind(token)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_token(&self, user_id: Uuid, token: &str) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM tokens WHERE token = $1 AND user_id = $2")
            .bind(token)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }

    async fn delete_tokens_for(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }
}
