use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::clients::libre::LibreClient;
use crate::config::Config;
use crate::db::Store;
use crate::services::TokenService;

pub mod auth;
mod error;
mod glucose;
mod insulin;

pub use error::ApiError;

pub struct AppState {
    pub config: Config,

    pub store: Store,

    pub libre: Arc<LibreClient>,

    pub tokens: TokenService,
}

/// Build a shared HTTP client with a bounded timeout for vendor calls.
/// LibreView is an external dependency; nothing here may block a request
/// indefinitely.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent("Glucolog/1.0")
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

pub async fn create_app_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let http_client = build_shared_http_client(config.libreview.request_timeout_seconds)?;
    let libre = Arc::new(LibreClient::with_shared_client(
        http_client,
        config.libreview.base_url.clone(),
    ));

    let tokens = TokenService::new(&config.auth.secret_key, config.auth.token_ttl_minutes);

    Ok(Arc::new(AppState {
        config,
        store,
        libre,
        tokens,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let protected_routes = Router::new()
        .route("/patient-id", get(glucose::get_patient_id))
        .route("/glucose-data", get(glucose::get_glucose_data))
        .route("/libre-token", get(glucose::get_libre_token))
        .route("/insulin-log", post(insulin::create_log))
        .route("/insulin-logs", get(insulin::list_logs))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/connect-libre", post(auth::connect_libre))
        .nest("/api", protected_routes)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
