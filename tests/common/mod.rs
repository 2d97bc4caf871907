#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::NamedTempFile;
use time::Date;
use tokio::sync::Mutex;
use tower::ServiceExt;

use todo_analytics::config::ServerConfig;
use todo_analytics::daemon::{build_router, AppState};
use todo_analytics::error::{Result, TodoAnalyticsError};
use todo_analytics::interfaces::providers::CompletionProvider;
use todo_analytics::todo::{NewTodo, TodoItem, TodoStore};

/// Replies with a fixed text and records every prompt it receives.
pub struct StaticProvider {
    pub reply: String,
    pub prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for StaticProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

pub struct FailingProvider;

#[async_trait]
impl CompletionProvider for FailingProvider {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(TodoAnalyticsError::Upstream(
            "connection refused".to_string(),
        ))
    }
}

pub async fn temp_store() -> (NamedTempFile, Arc<TodoStore>) {
    let db = NamedTempFile::new().unwrap();
    let store = TodoStore::new(db.path().to_str().unwrap()).await.unwrap();
    (db, Arc::new(store))
}

pub fn app(store: Arc<TodoStore>, provider: Arc<dyn CompletionProvider>) -> Router {
    build_router(AppState::new(store, provider), &ServerConfig::default())
}

pub async fn seed(
    store: &TodoStore,
    title: &str,
    description: &str,
    completed: bool,
    date: Date,
) -> TodoItem {
    store
        .create_item(NewTodo {
            title: title.to_string(),
            description: description.to_string(),
            completed,
            date: Some(date),
        })
        .await
        .unwrap()
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let raw = body.map(|value| value.to_string());
    send_raw(app, method, uri, raw.as_deref()).await
}

pub async fn send_raw(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(raw) => {
            builder = builder.header("content-type", "application/json");
            Body::from(raw.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

pub fn titles(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["title"].as_str().unwrap().to_string())
        .collect()
}
