use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use utoipa::ToSchema;

use crate::AppState;

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
    /// Turned off in configuration
    Disabled,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusDetails {
    pub database: ComponentHealth,
    pub shipping: ComponentHealth,
    pub email: ComponentHealth,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: ComponentStatus,
    pub service: String,
    pub version: String,
    pub environment: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub details: StatusDetails,
}

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Call once at startup so uptime is measured from boot.
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

fn collaborator_health(configured: bool, name: &str) -> ComponentHealth {
    if configured {
        ComponentHealth {
            status: ComponentStatus::Up,
            message: format!("{} configured", name),
            latency_ms: None,
        }
    } else {
        ComponentHealth {
            status: ComponentStatus::Disabled,
            message: format!("{} disabled, orders skip this step", name),
            latency_ms: None,
        }
    }
}

/// Overall status only follows the database. Shipping and email are
/// best-effort and never take the API down.
fn overall_status(database: &ComponentHealth) -> ComponentStatus {
    match database.status {
        ComponentStatus::Up => ComponentStatus::Up,
        _ => ComponentStatus::Down,
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    summary = "Liveness probe",
    responses((status = 200, description = "Service is running")),
    tag = "system"
)]
pub async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/status",
    summary = "Service status",
    description = "Database connectivity plus whether shipping and email are configured",
    responses(
        (status = 200, description = "Service healthy", body = StatusResponse),
        (status = 503, description = "Database unreachable", body = StatusResponse),
    ),
    tag = "system"
)]
pub async fn status_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_check_start = Instant::now();
    let db_result = state.db.ping().await;
    let db_latency = db_check_start.elapsed().as_millis() as u64;

    let database = ComponentHealth {
        status: if db_result.is_ok() {
            ComponentStatus::Up
        } else {
            ComponentStatus::Down
        },
        message: db_result.map_or_else(
            |e| format!("Connection failed: {}", e),
            |_| "Connection successful".to_string(),
        ),
        latency_ms: Some(db_latency),
    };

    let status = overall_status(&database);
    let response = StatusResponse {
        status,
        service: "uni-naturals-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: get_uptime_secs(),
        details: StatusDetails {
            database,
            shipping: collaborator_health(state.services.shipping_configured, "Shiprocket"),
            email: collaborator_health(state.services.mail_configured, "SMTP"),
        },
    };

    let code = match status {
        ComponentStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (code, Json(response))
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness_check))
        .route("/status", get(status_check))
}
