use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    db::{Deadline, StoreError},
    users::{repo::UserStore, repo_types::User},
};

/// Outcome of a revocation; a missing session is not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    Revoked,
    NoSuchSession,
}

/// Persisted set of currently honored tokens, backed by the credential store.
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn UserStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        user_id: Uuid,
        token: &str,
        deadline: Deadline,
    ) -> Result<(), StoreError> {
        deadline.run(self.store.insert_token(user_id, token)).await?;
        info!(%user_id, "session recorded");
        Ok(())
    }

    pub async fn revoke(
        &self,
        user_id: Uuid,
        token: &str,
        deadline: Deadline,
    ) -> Result<Revocation, StoreError> {
        let removed = deadline.run(self.store.delete_token(user_id, token)).await?;
        if removed == 0 {
            debug!(%user_id, "revoke found no session");
            return Ok(Revocation::NoSuchSession);
        }
        info!(%user_id, "session revoked");
        Ok(Revocation::Revoked)
    }

    pub async fn revoke_all(&self, user_id: Uuid, deadline: Deadline) -> Result<u64, StoreError> {
        let removed = deadline.run(self.store.delete_tokens_for(user_id)).await?;
        info!(%user_id, removed, "all sessions revoked");
        Ok(removed)
    }

    pub async fn is_active(&self, token: &str, deadline: Deadline) -> Result<bool, StoreError> {
        Ok(self.resolve(token, deadline).await?.is_some())
    }

    /// Owner of the session keyed by `token`, if the session is still recorded.
    pub async fn resolve(&self, token: &str, deadline: Deadline) -> Result<Option<User>, StoreError> {
        deadline.run(self.store.find_by_token(token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{memory::MemoryUserStore, repo_types::NewUser};
    use std::time::Duration;

    async fn setup() -> (SessionRegistry, User) {
        let store = Arc::new(MemoryUserStore::default());
        let user = store
            .create(NewUser {
                email: "a@x.com".into(),
                password_hash: "$argon2id$stub".into(),
                timezone: "UTC".into(),
            })
            .await
            .unwrap();
        (SessionRegistry::new(store), user)
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn recorded_token_is_active_until_revoked() {
        let (registry, user) = setup().await;
        registry.record(user.id, "tok-1", deadline()).await.unwrap();
        assert!(registry.is_active("tok-1", deadline()).await.unwrap());
        assert_eq!(
            registry.resolve("tok-1", deadline()).await.unwrap().map(|u| u.id),
            Some(user.id)
        );

        let outcome = registry.revoke(user.id, "tok-1", deadline()).await.unwrap();
        assert_eq!(outcome, Revocation::Revoked);
        assert!(!registry.is_active("tok-1", deadline()).await.unwrap());
    }

    #[tokio::test]
    async fn revoking_twice_reports_no_such_session() {
        let (registry, user) = setup().await;
        registry.record(user.id, "tok-1", deadline()).await.unwrap();
        registry.revoke(user.id, "tok-1", deadline()).await.unwrap();
        let again = registry.revoke(user.id, "tok-1", deadline()).await.unwrap();
        assert_eq!(again, Revocation::NoSuchSession);
        let unknown = registry.revoke(user.id, "never-issued", deadline()).await.unwrap();
        assert_eq!(unknown, Revocation::NoSuchSession);
    }

    #[tokio::test]
    async fn revoke_requires_matching_owner() {
        let (registry, user) = setup().await;
        registry.record(user.id, "tok-1", deadline()).await.unwrap();
        let outcome = registry
            .revoke(Uuid::new_v4(), "tok-1", deadline())
            .await
            .unwrap();
        assert_eq!(outcome, Revocation::NoSuchSession);
        assert!(registry.is_active("tok-1", deadline()).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_revocations_settle_on_one_winner() {
        let (registry, user) = setup().await;
        registry.record(user.id, "tok-1", deadline()).await.unwrap();

        let (a, b) = tokio::join!(
            registry.revoke(user.id, "tok-1", deadline()),
            registry.revoke(user.id, "tok-1", deadline()),
        );
        let mut outcomes = [a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o == Revocation::NoSuchSession);
        assert_eq!(outcomes, [Revocation::Revoked, Revocation::NoSuchSession]);
        assert!(!registry.is_active("tok-1", deadline()).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_all_drops_every_session() {
        let (registry, user) = setup().await;
        registry.record(user.id, "tok-1", deadline()).await.unwrap();
        registry.record(user.id, "tok-2", deadline()).await.unwrap();
        assert_eq!(registry.revoke_all(user.id, deadline()).await.unwrap(), 2);
        assert!(!registry.is_active("tok-1", deadline()).await.unwrap());
        assert!(!registry.is_active("tok-2", deadline()).await.unwrap());
    }
}
