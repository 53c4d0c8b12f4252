use tracing::warn;

use super::{repo::TaskStore, repo_types::Task};
use crate::{
    auth::identity::Identity,
    db::Deadline,
    error::{AppError, AppResult},
};

/// Loads task `id` only if the caller owns it.
///
/// A task that belongs to someone else and a task that does not exist are
/// indistinguishable to the caller: both are `AccessForbidden`.
pub async fn owned_task(
    store: &dyn TaskStore,
    identity: &Identity,
    id: i64,
    deadline: Deadline,
) -> AppResult<Task> {
    match deadline.run(store.find_owned(id, identity.user_id())).await? {
        Some(task) => Ok(task),
        None => {
            warn!(user_id = %identity.user_id(), task_id = id, "access to task not owned by caller");
            Err(AppError::AccessForbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::identity::SessionToken,
        tasks::{
            memory::MemoryTaskStore,
            repo_types::{Category, NewTask},
        },
    };
    use std::time::Duration;
    use time::macros::datetime;
    use uuid::Uuid;

    fn identity(user_id: Uuid) -> Identity {
        Identity::new(user_id, SessionToken::new("tok"))
    }

    #[tokio::test]
    async fn owner_passes_others_are_forbidden() {
        let store = MemoryTaskStore::default();
        let owner = Uuid::new_v4();
        let task = store
            .insert(
                owner,
                NewTask {
                    title: "t".into(),
                    description: String::new(),
                    category: Category::Note,
                    start_date: datetime!(2024-01-01 0:00 UTC),
                },
            )
            .await
            .unwrap();
        let deadline = Deadline::after(Duration::from_secs(1));

        let got = owned_task(&store, &identity(owner), task.id, deadline).await.unwrap();
        assert_eq!(got, task);

        let err = owned_task(&store, &identity(Uuid::new_v4()), task.id, deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AccessForbidden));

        let err = owned_task(&store, &identity(owner), 999, deadline).await.unwrap_err();
        assert!(matches!(err, AppError::AccessForbidden));
    }
}
