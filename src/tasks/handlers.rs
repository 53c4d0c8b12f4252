use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreateTaskRequest, DeletedResponse, UpdateTaskRequest},
    filter::TaskFilter,
    repo_types::Task,
    services,
};
use crate::{auth::extractors::AuthUser, error::AppResult, state::AppState};

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
}

#[instrument(skip(state, identity), fields(user_id = %identity.user_id()))]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(params): Query<Vec<(String, String)>>,
) -> AppResult<Json<Vec<Task>>> {
    let filter = TaskFilter::from_params(&params);
    let tasks = services::fetch(state.tasks.as_ref(), &identity, &filter, state.deadline()).await?;
    Ok(Json(tasks))
}

#[instrument(skip(state, identity, payload), fields(user_id = %identity.user_id()))]
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let Json(payload) = payload?;
    let task = services::create(state.tasks.as_ref(), &identity, payload, state.deadline()).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip(state, identity, id), fields(user_id = %identity.user_id()))]
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<Task>> {
    let Path(id) = id?;
    let task = services::get(state.tasks.as_ref(), &identity, id, state.deadline()).await?;
    Ok(Json(task))
}

#[instrument(skip(state, identity, id, payload), fields(user_id = %identity.user_id()))]
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> AppResult<Json<Task>> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let task =
        services::update(state.tasks.as_ref(), &identity, id, payload, state.deadline()).await?;
    Ok(Json(task))
}

#[instrument(skip(state, identity, id), fields(user_id = %identity.user_id()))]
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<DeletedResponse>> {
    let Path(id) = id?;
    let deleted = services::delete(state.tasks.as_ref(), &identity, id, state.deadline()).await?;
    Ok(Json(DeletedResponse { deleted }))
}
