/// Workflow management REST API endpoints
///
/// Direct access to the workflow registry without going through the chat flow.
/// Uploads are validated exactly like chat uploads and invalidate cached instances.

use crate::{
    api::AppState,
    workflow::{is_valid_workflow_name, WorkflowRecord},
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};

/// Response for workflow save/activate/delete operations
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct WorkflowListResponse {
    pub active: Option<String>,
    pub workflows: Vec<WorkflowRecord>,
}

/// Create workflow management routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", get(list_workflows))
        .route(
            "/api/workflows/{name}",
            get(get_workflow).put(save_workflow).delete(delete_workflow),
        )
        .route("/api/workflows/{name}/activate", post(activate_workflow))
}

/// List all workflows
///
/// GET /api/workflows
/// Returns: { "active": "echo", "workflows": [{ "name": ..., "file_path": ..., "metadata": {} }] }
async fn list_workflows(State(state): State<AppState>) -> Json<WorkflowListResponse> {
    Json(WorkflowListResponse {
        active: state.manager.get_active_workflow_name(),
        workflows: state.manager.list_workflows(),
    })
}

/// GET /api/workflows/{name}
async fn get_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<WorkflowRecord>, StatusCode> {
    state
        .manager
        .get_workflow_info(&name)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Create or replace a workflow
///
/// PUT /api/workflows/{name}
/// Body: raw workflow source
async fn save_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<WorkflowResponse>, (StatusCode, Json<Value>)> {
    if !is_valid_workflow_name(&name) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Workflow names may only contain lowercase letters, digits and underscores"
            })),
        ));
    }

    let is_update = state.manager.workflow_exists(&name);
    let manager = state.manager.clone();
    let target = name.clone();
    let saved =
        tokio::task::spawn_blocking(move || manager.save_workflow(&target, &body, is_update))
            .await
            .unwrap_or(false);

    if !saved {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "File does not contain a loadable workflow with a run_workflow() function"
            })),
        ));
    }

    let message = if is_update {
        format!("Workflow '{}' updated successfully", name)
    } else {
        format!("Workflow '{}' created successfully", name)
    };

    Ok(Json(WorkflowResponse { name, message }))
}

/// POST /api/workflows/{name}/activate
async fn activate_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<WorkflowResponse>, StatusCode> {
    let manager = state.manager.clone();
    let target = name.clone();
    let activated = tokio::task::spawn_blocking(move || manager.activate_workflow(&target))
        .await
        .unwrap_or(false);

    if !activated {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(WorkflowResponse {
        message: format!("Workflow '{}' activated", name),
        name,
    }))
}

/// DELETE /api/workflows/{name}
async fn delete_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<WorkflowResponse>, StatusCode> {
    if !state.manager.workflow_exists(&name) {
        return Err(StatusCode::NOT_FOUND);
    }

    if !state.manager.remove_workflow(&name) {
        tracing::error!("Failed to remove workflow {}", name);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    Ok(Json(WorkflowResponse {
        message: format!("Workflow '{}' deleted", name),
        name,
    }))
}
