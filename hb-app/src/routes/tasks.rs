use crate::error::AppError;
use crate::server::GatewayState;
use axum::extract::Path;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use hb_tasks::{ListResolution, NewTask, TaskItem, TaskList};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    #[serde(default)]
    list_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    due: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct FindOrCreateRequest {
    #[serde(default)]
    name: String,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/tasks", post(create_task))
        .route("/lists", get(list_task_lists))
        .route("/lists/{list_id}/tasks", get(list_tasks))
        .route("/lists/find_or_create", post(find_or_create_list))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))
}

#[tracing::instrument(level = "info", skip_all)]
async fn create_task(
    Extension(state): Extension<Arc<GatewayState>>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskItem>), AppError> {
    let req = json_body(payload)?;
    let task = NewTask {
        title: req.title,
        notes: req.notes.filter(|n| !n.trim().is_empty()),
        due: req.due,
    };
    let inserted = state
        .tasks
        .insert_task(&req.list_id, &task)
        .await
        .map_err(|e| state.task_error(e))?;
    Ok((StatusCode::CREATED, Json(inserted)))
}

#[tracing::instrument(level = "info", skip_all)]
async fn list_task_lists(
    Extension(state): Extension<Arc<GatewayState>>,
) -> Result<Json<Vec<TaskList>>, AppError> {
    let lists = state
        .tasks
        .list_task_lists()
        .await
        .map_err(|e| state.task_error(e))?;
    Ok(Json(lists))
}

#[tracing::instrument(level = "info", skip_all, fields(list_id = %list_id))]
async fn list_tasks(
    Extension(state): Extension<Arc<GatewayState>>,
    Path(list_id): Path<String>,
) -> Result<Json<Vec<TaskItem>>, AppError> {
    let tasks = state
        .tasks
        .list_tasks(&list_id)
        .await
        .map_err(|e| state.task_error(e))?;
    Ok(Json(tasks))
}

#[tracing::instrument(level = "info", skip_all)]
async fn find_or_create_list(
    Extension(state): Extension<Arc<GatewayState>>,
    payload: Result<Json<FindOrCreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ListResolution>), AppError> {
    let req = json_body(payload)?;
    let resolution = state
        .tasks
        .find_or_create_list(&req.name)
        .await
        .map_err(|e| state.task_error(e))?;
    let status = if resolution.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(resolution)))
}
