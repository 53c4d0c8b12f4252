use std::collections::BTreeMap;

use axum::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    filter::FilterPlan,
    repo::TaskStore,
    repo_types::{NewTask, Task},
};
use crate::db::StoreError;

#[derive(Default)]
struct Rows {
    last_id: i64,
    tasks: BTreeMap<i64, Task>,
}

/// In-process task table keyed by id.
#[derive(Default)]
pub struct MemoryTaskStore {
    rows: RwLock<Rows>,
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, owner: Uuid, task: NewTask) -> Result<Task, StoreError> {
        let mut rows = self.rows.write().await;
        rows.last_id += 1;
        let row = Task {
            id: rows.last_id,
            title: task.title,
            description: task.description,
            category: task.category,
            start_date: task.start_date,
            user_id: owner,
        };
        rows.tasks.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_owned(&self, id: i64, owner: Uuid) -> Result<Option<Task>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.tasks.get(&id).filter(|t| t.user_id == owner).cloned())
    }

    async fn fetch(&self, plan: &FilterPlan) -> Result<Vec<Task>, StoreError> {
        let rows = self.rows.read().await;
        let mut found: Vec<Task> = rows
            .tasks
            .values()
            .filter(|t| plan.matches(t))
            .cloned()
            .collect();
        found.sort_by(|a, b| plan.compare(a, b));
        Ok(found)
    }

    async fn update_owned(
        &self,
        id: i64,
        owner: Uuid,
        task: &Task,
    ) -> Result<Option<Task>, StoreError> {
        let mut rows = self.rows.write().await;
        Ok(rows
            .tasks
            .get_mut(&id)
            .filter(|t| t.user_id == owner)
            .map(|t| {
                t.title = task.title.clone();
                t.description = task.description.clone();
                t.category = task.category;
                t.start_date = task.start_date;
                t.clone()
            }))
    }

    async fn delete_owned(&self, id: i64, owner: Uuid) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().await;
        if rows.tasks.get(&id).is_some_and(|t| t.user_id == owner) {
            rows.tasks.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{
        filter::{build, SortField, SortOrder, TaskFilter},
        repo_types::Category,
    };
    use time::{macros::datetime, OffsetDateTime};

    fn new_task(title: &str, category: Category) -> NewTask {
        NewTask {
            title: title.into(),
            description: String::new(),
            category,
            start_date: datetime!(2024-02-15 10:00 UTC),
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let store = MemoryTaskStore::default();
        let owner = Uuid::new_v4();
        let a = store.insert(owner, new_task("a", Category::Note)).await.unwrap();
        let b = store.insert(owner, new_task("b", Category::Note)).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(a.user_id, owner);
    }

    #[tokio::test]
    async fn other_owners_cannot_reach_a_row() {
        let store = MemoryTaskStore::default();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let task = store.insert(owner, new_task("a", Category::Note)).await.unwrap();

        assert!(store.find_owned(task.id, stranger).await.unwrap().is_none());
        assert!(store.update_owned(task.id, stranger, &task).await.unwrap().is_none());
        assert!(!store.delete_owned(task.id, stranger).await.unwrap());
        assert!(store.delete_owned(task.id, owner).await.unwrap());
        assert!(store.find_owned(task.id, owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_applies_plan_filter_and_order() {
        let store = MemoryTaskStore::default();
        let owner = Uuid::new_v4();
        store.insert(owner, new_task("b-event", Category::Event)).await.unwrap();
        store.insert(owner, new_task("a-note", Category::Note)).await.unwrap();
        store.insert(owner, new_task("c-event", Category::Event)).await.unwrap();
        store
            .insert(Uuid::new_v4(), new_task("z-event", Category::Event))
            .await
            .unwrap();

        let plan = build(
            &TaskFilter {
                category: Some(Category::Event),
                order: SortOrder::Desc,
                order_by: SortField::Title,
                ..Default::default()
            },
            owner,
            OffsetDateTime::now_utc(),
        );
        let titles: Vec<_> = store
            .fetch(&plan)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["c-event", "b-event"]);
    }
}
