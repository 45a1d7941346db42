use axum::{Extension, Json, extract::State};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::auth::AuthContext;
use super::{ApiError, AppState};

#[derive(Serialize)]
pub struct PatientIdResponse {
    pub success: bool,
    #[serde(rename = "patientId")]
    pub patient_id: String,
}

#[derive(Serialize)]
pub struct GlucoseDataResponse {
    pub success: bool,
    pub data: Vec<Value>,
}

#[derive(Serialize)]
pub struct LibreTokenResponse {
    #[serde(rename = "libreToken")]
    pub libre_token: String,
}

/// The caller's LibreView token, or the 400 the relay endpoints share
/// when no account is linked. Checked before any vendor call is made.
fn require_libre_token(ctx: &AuthContext) -> Result<&str, ApiError> {
    ctx.libre_token()
        .ok_or_else(|| ApiError::validation("LibreView not connected"))
}

/// GET /api/patient-id
pub async fn get_patient_id(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<PatientIdResponse>, ApiError> {
    let token = require_libre_token(&ctx)?;

    let patient_id = state
        .libre
        .fetch_patient_id(token)
        .await
        .map_err(|e| ApiError::vendor(format!("Failed to fetch patient ID: {e}")))?;

    Ok(Json(PatientIdResponse {
        success: true,
        patient_id,
    }))
}

/// GET /api/glucose-data
///
/// Two sequential vendor calls: resolve the patient id, then fetch the
/// graph. The response carries history first, current measurement last.
pub async fn get_glucose_data(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<GlucoseDataResponse>, ApiError> {
    let token = require_libre_token(&ctx)?;

    let patient_id = state
        .libre
        .fetch_patient_id(token)
        .await
        .map_err(|e| ApiError::vendor(format!("Failed to fetch glucose data: {e}")))?;

    let data = state
        .libre
        .fetch_glucose_series(&patient_id, token, ctx.user.libre_id.as_deref())
        .await
        .map_err(|e| ApiError::vendor(format!("Failed to fetch glucose data: {e}")))?;

    Ok(Json(GlucoseDataResponse {
        success: true,
        data,
    }))
}

/// GET /api/libre-token
///
/// Returns the stored (or per-request override) vendor token without
/// touching the vendor API.
pub async fn get_libre_token(
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<LibreTokenResponse>, ApiError> {
    let token = require_libre_token(&ctx)?;

    Ok(Json(LibreTokenResponse {
        libre_token: token.to_string(),
    }))
}
