use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::{
    dto::{CreateTaskRequest, UpdateTaskRequest},
    filter::{self, TaskFilter},
    guard::owned_task,
    repo::TaskStore,
    repo_types::{NewTask, Task, TaskChanges},
};
use crate::{
    auth::identity::Identity,
    db::Deadline,
    error::{AppError, AppResult},
};

const MAX_TITLE_CHARS: usize = 200;

fn check_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::BadRequest("title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::BadRequest(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

pub async fn get(
    store: &dyn TaskStore,
    identity: &Identity,
    id: i64,
    deadline: Deadline,
) -> AppResult<Task> {
    owned_task(store, identity, id, deadline).await
}

/// Lists the caller's tasks. The owner clause is always part of the query.
pub async fn fetch(
    store: &dyn TaskStore,
    identity: &Identity,
    filter: &TaskFilter,
    deadline: Deadline,
) -> AppResult<Vec<Task>> {
    let plan = filter::build(filter, identity.user_id(), OffsetDateTime::now_utc());
    let tasks = deadline.run(store.fetch(&plan)).await?;
    debug!(user_id = %identity.user_id(), ?filter, count = tasks.len(), "tasks fetched");
    Ok(tasks)
}

pub async fn create(
    store: &dyn TaskStore,
    identity: &Identity,
    req: CreateTaskRequest,
    deadline: Deadline,
) -> AppResult<Task> {
    check_title(&req.title)?;
    let new = NewTask {
        title: req.title.trim().to_string(),
        description: req.description,
        category: req.category,
        start_date: req.start_date,
    };
    let task = deadline.run(store.insert(identity.user_id(), new)).await?;
    info!(user_id = %identity.user_id(), task_id = task.id, "task created");
    Ok(task)
}

pub async fn update(
    store: &dyn TaskStore,
    identity: &Identity,
    id: i64,
    req: UpdateTaskRequest,
    deadline: Deadline,
) -> AppResult<Task> {
    let title = req.title.map(|t| t.trim().to_string());
    if let Some(t) = title.as_deref().filter(|t| !t.is_empty()) {
        check_title(t)?;
    }

    let current = owned_task(store, identity, id, deadline).await?;
    let merged = TaskChanges {
        title,
        description: req.description,
        category: req.category,
        start_date: req.start_date,
    }
    .apply(current);

    match deadline
        .run(store.update_owned(id, identity.user_id(), &merged))
        .await?
    {
        Some(task) => {
            info!(user_id = %identity.user_id(), task_id = id, "task updated");
            Ok(task)
        }
        None => {
            warn!(user_id = %identity.user_id(), task_id = id, "task vanished before update");
            Err(AppError::NotFound("task not found".into()))
        }
    }
}

pub async fn delete(
    store: &dyn TaskStore,
    identity: &Identity,
    id: i64,
    deadline: Deadline,
) -> AppResult<bool> {
    owned_task(store, identity, id, deadline).await?;
    if !deadline
        .run(store.delete_owned(id, identity.user_id()))
        .await?
    {
        warn!(user_id = %identity.user_id(), task_id = id, "task vanished before delete");
        return Err(AppError::NotFound("task not found".into()));
    }
    info!(user_id = %identity.user_id(), task_id = id, "task deleted");
    Ok(true)
}
