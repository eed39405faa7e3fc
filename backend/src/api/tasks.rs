use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use tracing::debug;

use crate::db::tasks as repository;
use crate::error::AppError;
use crate::models::{NewTaskRequest, Task, TaskFilter, UpdateStatusRequest, UpdateTaskRequest};
use crate::state::AppState;

pub(super) async fn list_tasks(
    State(state): State<AppState>,
    params: Result<Query<TaskFilter>, QueryRejection>,
) -> Result<Json<Vec<Task>>, AppError> {
    let Query(filter) = params?;
    let tasks = repository::fetch_tasks(&state.db, &filter).await?;
    Ok(Json(tasks))
}

pub(super) async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let task = repository::find_task_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

pub(super) async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<NewTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let Json(req) = payload?;
    req.validate()?;
    let task = repository::insert_task(&state.db, req).await?;
    debug!("created task {}", task.id);
    Ok((StatusCode::CREATED, Json(task)))
}

pub(super) async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, AppError> {
    let Json(req) = payload?;
    req.validate()?;
    let task = repository::update_task(&state.db, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

pub(super) async fn update_task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Task>, AppError> {
    let Json(req) = payload?;
    let task = repository::update_task_status(&state.db, &id, req.status)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

pub(super) async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let ok = repository::delete_task(&state.db, &id).await?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
