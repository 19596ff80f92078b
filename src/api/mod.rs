//! HTTP surface: JSON API plus the embedded dashboard page.

use std::sync::Arc;

use axum::{Router, response::Html, routing::get};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::analysis::{PortAnalyzer, PortRange};
use crate::config::ConfigStore;
use crate::model::PortAnalysis;

mod config;
pub mod error;
mod ports;

pub use error::ApiError;

const INDEX_HTML: &str = include_str!("static/index.html");

/// Shared by every handler. The store is owned here rather than living in a
/// global so tests can point it at a scratch file.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub analyzer: Arc<PortAnalyzer>,
}

impl AppState {
    pub fn new(store: Arc<ConfigStore>, analyzer: PortAnalyzer) -> Self {
        Self {
            store,
            analyzer: Arc::new(analyzer),
        }
    }

    /// Runs a fresh OS query on the blocking pool.
    pub async fn analyze(&self, range: PortRange) -> Result<PortAnalysis, ApiError> {
        let state = self.clone();
        let analysis = tokio::task::spawn_blocking(move || {
            state.analyzer.analyze(&state.store.current(), range)
        })
        .await?;
        Ok(analysis)
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

impl MessageResponse {
    pub fn ok(message: &'static str) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/ports", get(ports::api_ports))
        .route(
            "/api/config",
            get(config::api_get_config).post(config::api_save_config),
        )
        .route("/api/refresh", get(ports::api_refresh))
        .route("/api/export", get(ports::api_export))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(host: &str, port: u16, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(address = %listener.local_addr()?, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
