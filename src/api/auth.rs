use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::entities::users;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Deserialize)]
pub struct ConnectLibreRequest {
    pub token: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct ConnectLibreResponse {
    pub message: String,
    pub user: UserDto,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// User shape returned to clients. The password hash never leaves the
/// store layer.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i32,
    pub email: String,
    pub libre_id: Option<String>,
    pub libre_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for UserDto {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            libre_id: user.libre_id,
            libre_token: user.libre_token,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// The authenticated caller, resolved once per request by
/// [`require_auth`] and handed to handlers as a request extension.
///
/// A `libretoken` header on the request overrides the stored LibreView
/// token for that single request; it is never persisted.
#[derive(Clone)]
pub struct AuthContext {
    pub user: users::Model,
    pub libre_token_override: Option<String>,
}

impl AuthContext {
    /// The LibreView token to use for this request: the per-request
    /// override if one was supplied, otherwise the stored one.
    #[must_use]
    pub fn libre_token(&self) -> Option<&str> {
        self.libre_token_override
            .as_deref()
            .or(self.user.libre_token.as_deref())
    }
}

/// Authentication middleware for everything under /api.
///
/// Verifies the local bearer token's signature and expiry, resolves the
/// embedded user id against the store, and short-circuits with 401 on
/// any failure. No downstream handler runs for a rejected request.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = extract_bearer_token(&headers) else {
        return Err(ApiError::unauthorized("Authentication token required"));
    };

    let claims = state
        .tokens
        .verify(&token)
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;

    let user = state
        .store
        .get_user_by_id(claims.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Error resolving user {}: {e}", claims.user_id);
            ApiError::unauthorized("User not found")
        })?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    let libre_token_override = headers
        .get("libretoken")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    request.extensions_mut().insert(AuthContext {
        user,
        libre_token_override,
    });

    Ok(next.run(request).await)
}

/// Extract the local session token from `Authorization: Bearer <token>`.
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    None
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    if payload.email.trim().is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let existing = state
        .store
        .get_user_by_email(&payload.email)
        .await
        .map_err(|e| {
            tracing::error!("Error registering user: {e}");
            ApiError::internal("Failed to register user")
        })?;

    if existing.is_some() {
        return Err(ApiError::validation("User already exists"));
    }

    state
        .store
        .create_user(&payload.email, &payload.password)
        .await
        .map_err(|e| {
            tracing::error!("Error registering user: {e}");
            ApiError::internal("Failed to register user")
        })?;

    tracing::info!("Registered user: {}", payload.email);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully".to_string(),
        }),
    ))
}

/// POST /auth/login
///
/// Unknown email and wrong password produce the identical response so
/// the endpoint cannot be used to enumerate accounts.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .store
        .get_user_by_email(&payload.email)
        .await
        .map_err(|e| {
            tracing::error!("Error logging in: {e}");
            ApiError::internal("Failed to login")
        })?
        .ok_or_else(|| ApiError::validation("Invalid credentials"))?;

    let is_valid = state
        .store
        .verify_user_password(&payload.email, &payload.password)
        .await
        .map_err(|e| {
            tracing::error!("Error logging in: {e}");
            ApiError::internal("Failed to login")
        })?;

    if !is_valid {
        return Err(ApiError::validation("Invalid credentials"));
    }

    let token = state.tokens.issue(user.id).map_err(|e| {
        tracing::error!("Error signing session token: {e}");
        ApiError::internal("Failed to login")
    })?;

    Ok(Json(TokenResponse { token }))
}

/// POST /auth/connect-libre
///
/// Exchanges LibreView credentials for a vendor token and stores it,
/// together with the hashed account id, on the user identified by the
/// session token. The token is verified with the same contract as the
/// /api middleware; an unsigned or expired token is rejected.
pub async fn connect_libre(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ConnectLibreRequest>,
) -> Result<Json<ConnectLibreResponse>, ApiError> {
    let claims = state
        .tokens
        .verify(&payload.token)
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;

    let login = state
        .libre
        .login(&payload.email, &payload.password)
        .await
        .map_err(|e| ApiError::vendor(format!("Failed to connect to LibreView: {e}")))?;

    let user = state
        .store
        .link_libre_account(claims.user_id, &login.libre_id, &login.token)
        .await
        .map_err(|e| {
            tracing::error!("Error storing LibreView link: {e}");
            ApiError::internal("Failed to connect to LibreView")
        })?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    tracing::info!("LibreView account linked for user {}", user.id);

    Ok(Json(ConnectLibreResponse {
        message: "LibreView account connected".to_string(),
        user: user.into(),
    }))
}
