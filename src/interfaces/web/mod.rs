pub(crate) mod auth;
mod handlers;
mod router;

use anyhow::Result;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tracing::info;

use crate::core::orchestrator::Orchestrator;
use crate::jobs::JobRunner;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) orchestrator: Arc<Orchestrator>,
    pub(crate) jobs: Arc<JobRunner>,
    pub(crate) log_tx: tokio::sync::broadcast::Sender<String>,
    pub(crate) api_host: String,
    pub(crate) api_port: u16,
    pub(crate) api_token: Option<String>,
}

pub struct ApiServerConfig {
    pub orchestrator: Arc<Orchestrator>,
    pub jobs: Arc<JobRunner>,
    pub log_tx: tokio::sync::broadcast::Sender<String>,
    pub api_host: String,
    pub api_port: u16,
    pub api_token: Option<String>,
}

/// Binds the API listener and serves until the process exits.
pub async fn serve(config: ApiServerConfig) -> Result<()> {
    let addr = format!("{}:{}", config.api_host, config.api_port);
    let state = AppState {
        orchestrator: config.orchestrator,
        jobs: config.jobs,
        log_tx: config.log_tx,
        api_host: config.api_host,
        api_port: config.api_port,
        api_token: config.api_token,
    };
    let app = router::build_api_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API Server running at http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

// --- SSE Logs (used by router) ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(line) => Ok(Event::default().data(line)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });
    Sse::new(stream)
}
