use axum::async_trait;
use sqlx::{postgres::PgArguments, query::QueryAs, PgPool, Postgres};
use uuid::Uuid;

use super::{
    filter::{FilterPlan, QueryArg},
    repo_types::{NewTask, Task, TaskRow},
};
use crate::db::StoreError;

/// Task persistence. Every single-row operation is keyed by `(id, owner)`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, owner: Uuid, task: NewTask) -> Result<Task, StoreError>;
    async fn find_owned(&self, id: i64, owner: Uuid) -> Result<Option<Task>, StoreError>;
    async fn fetch(&self, plan: &FilterPlan) -> Result<Vec<Task>, StoreError>;
    /// Writes every mutable field of `task`; `None` when the row is gone.
    async fn update_owned(&self, id: i64, owner: Uuid, task: &Task)
        -> Result<Option<Task>, StoreError>;
    async fn delete_owned(&self, id: i64, owner: Uuid) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct PgTaskStore {
    db: PgPool,
}

impl PgTaskStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const SELECT_TASKS: &str =
    "SELECT id, title, description, category, start_date, user_id FROM tasks WHERE 1 = 1";

fn bind_arg<'q>(
    q: QueryAs<'q, Postgres, TaskRow, PgArguments>,
    arg: QueryArg,
) -> QueryAs<'q, Postgres, TaskRow, PgArguments> {
    match arg {
        QueryArg::Text(s) => q.bind(s),
        QueryArg::Timestamp(ts) => q.bind(ts),
        QueryArg::Uuid(id) => q.bind(id),
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, owner: Uuid, task: NewTask) -> Result<Task, StoreError> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            INSERT INTO tasks (title, description, category, start_date, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, description, category, start_date, user_id
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.category.as_str())
        .bind(task.start_date)
        .bind(owner)
        .fetch_one(&self.db)
        .await?;
        row.try_into()
    }

    async fn find_owned(&self, id: i64, owner: Uuid) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, title, description, category, start_date, user_id
            FROM tasks
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        row.map(Task::try_from).transpose()
    }

    async fn fetch(&self, plan: &FilterPlan) -> Result<Vec<Task>, StoreError> {
        let fragment = plan.to_sql();
        let sql = format!("{SELECT_TASKS}{}", fragment.sql);
        let query = fragment
            .args
            .into_iter()
            .fold(sqlx::query_as::<_, TaskRow>(&sql), bind_arg);
        let rows = query.fetch_all(&self.db).await?;
        rows.into_iter().map(Task::try_from).collect()
    }

    async fn update_owned(
        &self,
        id: i64,
        owner: Uuid,
        task: &Task,
    ) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            UPDATE tasks
            SET title = $1, description = $2, category = $3, start_date = $4
            WHERE id = $5 AND user_id = $6
            RETURNING id, title, description, category, start_date, user_id
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.category.as_str())
        .bind(task.start_date)
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        row.map(Task::try_from).transpose()
    }

    async fn delete_owned(&self, id: i64, owner: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() == 1)
    }
}
