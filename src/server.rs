//! HTTP request layer.
//!
//! - `POST /api/tasks` creates a task and schedules it
//! - `GET /api/tasks/{task_id}` reports its status and, once done, its path
//! - `GET /api/health` reports per-status task counts

use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::service::PathService;
use crate::types::{Task, TaskCounts, TaskId, TaskStatus};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub id: TaskId,
}

/// Public view of a task. `path` stays null until the task is done.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskView {
    pub id: TaskId,
    pub from: String,
    pub to: String,
    pub status: TaskStatus,
    pub path: Option<Vec<String>>,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        let path = match task.status {
            TaskStatus::Done => task.result.map(|r| r.shortest_path),
            _ => None,
        };
        Self {
            id: task.id,
            from: task.from,
            to: task.to,
            status: task.status,
            path,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    tasks: TaskCounts,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

async fn create_task(
    State(service): State<PathService>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ServiceResult<(StatusCode, Json<CreateTaskResponse>)> {
    let Json(request) =
        payload.map_err(|rejection| ServiceError::invalid_value("body", &rejection.body_text()))?;
    let id = service.find_shortest_path(&request.from, &request.to).await?;
    Ok((StatusCode::CREATED, Json(CreateTaskResponse { id })))
}

async fn get_task(
    State(service): State<PathService>,
    Path(task_id): Path<String>,
) -> ServiceResult<Json<TaskView>> {
    let task = service.get_task(&task_id)?;
    Ok(Json(task.into()))
}

async fn health(State(service): State<PathService>) -> ServiceResult<Json<HealthResponse>> {
    let tasks = service.task_counts()?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        tasks,
    }))
}

pub fn build_router(service: PathService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/tasks", post(create_task))
        .route("/api/tasks/{task_id}", get(get_task))
        .route("/api/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Bind `addr` and serve in the background.
///
/// Returns a sender that stops the server gracefully and the bound address
/// (useful when binding port 0).
pub async fn start_server(
    service: PathService,
    addr: SocketAddr,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Request server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Request server shutting down");
            })
            .await
        {
            tracing::error!("Request server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}
