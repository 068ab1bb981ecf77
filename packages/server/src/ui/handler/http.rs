//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    infrastructure::dto::http::{ProjectDetailDto, ProjectSummaryDto},
    infrastructure::dto::websocket::MessageDto,
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of active project rooms
pub async fn get_projects(State(state): State<Arc<AppState>>) -> Json<Vec<ProjectSummaryDto>> {
    let summaries = state.project_state_usecase.summaries().await;

    // Domain Model から DTO への変換
    let dtos: Vec<ProjectSummaryDto> = summaries.into_iter().map(Into::into).collect();
    Json(dtos)
}

/// Get project room detail (presence + typing) by project id
pub async fn get_project_detail(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectDetailDto>, StatusCode> {
    let project_id = crate::domain::ProjectId::new(project_id)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    match state.project_state_usecase.detail(&project_id).await {
        Some(project_state) => {
            // Domain Model から DTO への変換
            let detail = ProjectDetailDto {
                project_id: project_state.project_id.into_string(),
                participants: project_state
                    .presence
                    .into_iter()
                    .map(Into::into)
                    .collect(),
                typing: project_state.typing.into_iter().map(Into::into).collect(),
            };
            Ok(Json(detail))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// Get message history for a project (read back from the message store)
pub async fn get_project_messages(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<MessageDto>>, StatusCode> {
    let project_id = crate::domain::ProjectId::new(project_id)
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    match state.project_state_usecase.messages(&project_id).await {
        Ok(messages) => Ok(Json(messages.into_iter().map(Into::into).collect())),
        Err(e) => {
            tracing::error!("Failed to list messages for '{}': {}", project_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
