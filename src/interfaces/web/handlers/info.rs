use axum::{Json, extract::State};
use serde_json::{Value, json};

use super::super::AppState;

/// Lists the tool catalog exactly as it is declared to the model.
pub async fn list_tools_endpoint(State(state): State<AppState>) -> Json<Value> {
    let declarations = state.orchestrator.tools().registry().declarations();
    Json(json!({
        "success": true,
        "tools": declarations,
    }))
}

/// Current operational snapshot, same data the system prompt is built from.
pub async fn context_endpoint(State(state): State<AppState>) -> Json<Value> {
    match state.orchestrator.context().build().await {
        Ok(snapshot) => Json(json!({ "success": true, "context": snapshot })),
        Err(e) => Json(json!({ "success": false, "error": e.to_string() })),
    }
}
