use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Json, Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::analytics::{AnalyticsParams, AnalyticsReport, AnalyticsRequest, AnalyticsService};
use crate::config::{Config, ServerConfig};
use crate::error::{Result, TodoAnalyticsError};
use crate::interfaces::providers::CompletionProvider;
use crate::providers::MistralProvider;
use crate::todo::{TodoInput, TodoItem, TodoStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TodoStore>,
    pub analytics: Arc<AnalyticsService>,
}

impl AppState {
    pub fn new(store: Arc<TodoStore>, provider: Arc<dyn CompletionProvider>) -> Self {
        let analytics = Arc::new(AnalyticsService::new(store.clone(), provider));
        Self { store, analytics }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/", get(api_root))
        .route("/api/todos/", get(list_todos).post(create_todo))
        .route(
            "/api/todos/:id/",
            get(retrieve_todo)
                .put(replace_todo)
                .patch(patch_todo)
                .delete(destroy_todo),
        )
        .route("/api/analytics/", get(todo_analytics))
        .layer(server.cors_layer())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn api_root() -> Json<Value> {
    Json(json!({
        "todos": "/api/todos/",
        "analytics": "/api/analytics/",
    }))
}

async fn list_todos(State(state): State<AppState>) -> Result<Json<Vec<TodoItem>>> {
    Ok(Json(state.store.list_items().await?))
}

async fn create_todo(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TodoInput>, JsonRejection>,
) -> Result<(StatusCode, Json<TodoItem>)> {
    let Json(input) = payload.map_err(json_rejection)?;
    let item = state.store.create_item(input.into_new_todo()?).await?;
    tracing::info!(id = item.id, "todo created");
    Ok((StatusCode::CREATED, Json(item)))
}

async fn retrieve_todo(
    State(state): State<AppState>,
    id: std::result::Result<Path<i32>, PathRejection>,
) -> Result<Json<TodoItem>> {
    let Path(id) = id.map_err(path_rejection)?;
    Ok(Json(state.store.get_item(id).await?))
}

async fn replace_todo(
    State(state): State<AppState>,
    id: std::result::Result<Path<i32>, PathRejection>,
    payload: std::result::Result<Json<TodoInput>, JsonRejection>,
) -> Result<Json<TodoItem>> {
    let Path(id) = id.map_err(path_rejection)?;
    let Json(input) = payload.map_err(json_rejection)?;
    let item = state.store.update_item(id, input.into_replacement()?).await?;
    Ok(Json(item))
}

async fn patch_todo(
    State(state): State<AppState>,
    id: std::result::Result<Path<i32>, PathRejection>,
    payload: std::result::Result<Json<TodoInput>, JsonRejection>,
) -> Result<Json<TodoItem>> {
    let Path(id) = id.map_err(path_rejection)?;
    let Json(input) = payload.map_err(json_rejection)?;
    let item = state.store.update_item(id, input.into_patch()?).await?;
    Ok(Json(item))
}

async fn destroy_todo(
    State(state): State<AppState>,
    id: std::result::Result<Path<i32>, PathRejection>,
) -> Result<StatusCode> {
    let Path(id) = id.map_err(path_rejection)?;
    state.store.delete_item(id).await?;
    tracing::info!(id, "todo deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn todo_analytics(
    State(state): State<AppState>,
    params: std::result::Result<Query<AnalyticsParams>, QueryRejection>,
) -> Result<Json<AnalyticsReport>> {
    let Query(params) =
        params.map_err(|rejection| TodoAnalyticsError::BadRequest(rejection.body_text()))?;
    // Parameters are validated before the store or the provider is touched.
    let request = AnalyticsRequest::from_params(params)?;
    let report = state.analytics.analyze(&request).await?;
    tracing::info!(todos = report.todos.len(), "analytics served");
    Ok(Json(report))
}

fn json_rejection(rejection: JsonRejection) -> TodoAnalyticsError {
    TodoAnalyticsError::BadRequest(rejection.body_text())
}

fn path_rejection(_: PathRejection) -> TodoAnalyticsError {
    TodoAnalyticsError::NotFound("Not found.".to_string())
}

pub async fn run(config: Config) -> Result<()> {
    run_with_shutdown(config, shutdown_signal()).await
}

pub async fn run_with_shutdown<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = Arc::new(TodoStore::new(&config.database.sqlite_path).await?);
    let provider: Arc<dyn CompletionProvider> = Arc::new(MistralProvider::new(&config.ai)?);
    let app = build_router(AppState::new(store, provider), &config.server);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;
    tracing::info!(%addr, model = %config.ai.model, "todo-analytics listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| TodoAnalyticsError::Runtime(e.to_string()))?;

    tracing::info!("todo-analytics stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
