use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use fieldplan::{
    database::{
        rebuild_service::DEFAULT_WINDOW_DAYS, DatabaseConfig, DatabaseManager, PgPlanRepository,
        RebuildRequest, RebuildService,
    },
    planner::PlannerConfig,
    PlanningError,
};

// Application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RebuildService<PgPlanRepository>>,
    pub api_token: Option<String>,
}

// API types
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct RebuildPlanBody {
    pub start_date: Option<String>,
    pub days: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter("fieldplan_web_server=info,fieldplan=info,tower_http=debug")
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Database connection
    let manager = DatabaseManager::new(DatabaseConfig::default()).await?;

    // Planner configuration
    let mut planner_config = PlannerConfig::default();
    if let Ok(categories) = std::env::var("PLANNER_CATEGORIES") {
        planner_config = PlannerConfig::with_categories(
            categories.split(',').map(|c| c.trim().to_string()),
        );
    }

    let lock_ttl = std::env::var("PLANNER_LOCK_TTL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs);

    let mut service = RebuildService::new(manager.plan_repository(), planner_config);
    if let Some(ttl) = lock_ttl {
        service = service.with_lock_ttl(ttl);
    }

    let api_token = std::env::var("PLANNER_API_TOKEN").ok();
    if api_token.is_none() {
        warn!("PLANNER_API_TOKEN not set; all rebuild requests will be rejected");
    }

    // Create application state
    let app_state = AppState {
        service: Arc::new(service),
        api_token,
    };

    // Build our application with routes
    let app = create_router(app_state);

    // Determine port
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let addr = format!("0.0.0.0:{}", port);
    info!("Starting server on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/rebuild-plan", post(rebuild_plan))
        .route("/api/health", get(health_check))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse {
        success: true,
        data: Some("OK".to_string()),
        error: None,
    })
}

// Trigger a plan rebuild for the requested window
async fn rebuild_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RebuildPlanBody>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let req_id = Uuid::new_v4().to_string();

    // Authentication happens before any input parsing or data access.
    if !authorized(&headers, state.api_token.as_deref()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid or missing token", "reqId": req_id })),
        );
    }

    // An absent or malformed JSON body is treated as an empty request, so
    // the caller still gets the specific start_date error.
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let Some(raw_date) = body.start_date else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "start_date required", "reqId": req_id })),
        );
    };
    let Ok(start_date) = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid start_date format", "reqId": req_id })),
        );
    };

    let request = RebuildRequest::new(start_date, body.days.unwrap_or(DEFAULT_WINDOW_DAYS));
    info!(req_id = %req_id, start_date = %request.start_date, days = request.days, "rebuild requested");

    match state.service.rebuild(&request).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "scheduled": summary.scheduled, "reqId": req_id })),
        ),
        Err(PlanningError::LockConflict) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": PlanningError::LockConflict.to_string(), "reqId": req_id })),
        ),
        Err(PlanningError::InvalidRequest(message)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": message, "reqId": req_id })),
        ),
        Err(e) => {
            error!(req_id = %req_id, error = %e, "rebuild failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "message": e.to_string(), "reqId": req_id })),
            )
        }
    }
}

/// Bearer-token check against the configured credential. Fails closed
/// when no token is configured.
fn authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token == expected)
        .unwrap_or(false)
}
