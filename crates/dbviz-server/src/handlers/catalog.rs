//! Read-only catalogue routes.

use axum::extract::Path;
use axum::Json;
use dbviz_engines::scenarios::{self, Scenario};
use dbviz_engines::{ProjectInfo, Topic};
use serde::Serialize;

use crate::error::ApiError;

/// Standard success envelope: `{ "success": true, "data": ... }`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(ApiResponse { success: true, data })
    }
}

/// `GET /health`
pub async fn health() -> &'static str {
    "OK"
}

/// `GET /api/projects`
pub async fn list_projects() -> Json<ApiResponse<Vec<ProjectInfo>>> {
    ApiResponse::ok(dbviz_engines::projects().iter().map(|p| p.info).collect())
}

/// `GET /api/topics`
pub async fn list_topics() -> Json<ApiResponse<Vec<Topic>>> {
    ApiResponse::ok(dbviz_engines::topics())
}

/// `GET /api/scenarios`
pub async fn list_scenarios() -> Json<ApiResponse<Vec<Scenario>>> {
    ApiResponse::ok(scenarios::all())
}

/// `GET /api/scenarios/{id}`
pub async fn get_scenario(Path(id): Path<String>) -> Result<Json<ApiResponse<Scenario>>, ApiError> {
    scenarios::find(&id)
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::NotFound(format!("scenario '{id}'")))
}
