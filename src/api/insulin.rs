use axum::{Extension, Json, extract::State, http::StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::AuthContext;
use super::{ApiError, AppState};
use crate::constants::limits::RECENT_INSULIN_LOGS;
use crate::entities::insulin_logs;

const VALID_KINDS: &[&str] = &["IOB", "COB"];

#[derive(Deserialize)]
pub struct CreateInsulinLogRequest {
    pub units: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// POST /api/insulin-log
pub async fn create_log(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(payload): Json<CreateInsulinLogRequest>,
) -> Result<(StatusCode, Json<insulin_logs::Model>), ApiError> {
    if !payload.units.is_finite() || payload.units <= 0.0 {
        return Err(ApiError::validation("Units must be a positive number"));
    }

    if !VALID_KINDS.contains(&payload.kind.as_str()) {
        return Err(ApiError::validation("Type must be one of IOB, COB"));
    }

    let entry = state
        .store
        .add_insulin_log(ctx.user.id, payload.units, &payload.kind)
        .await
        .map_err(|e| {
            tracing::error!("Error saving insulin log: {e}");
            ApiError::internal("Failed to save insulin log")
        })?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /api/insulin-logs
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<Vec<insulin_logs::Model>>, ApiError> {
    let entries = state
        .store
        .recent_insulin_logs(ctx.user.id, RECENT_INSULIN_LOGS)
        .await
        .map_err(|e| {
            tracing::error!("Error fetching insulin logs: {e}");
            ApiError::internal("Failed to fetch insulin logs")
        })?;

    Ok(Json(entries))
}
