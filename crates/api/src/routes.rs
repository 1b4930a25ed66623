use crate::state::AppState;
use crate::{analysis, auth};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_app(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/healthz", get(healthz))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/analysis/analyze", post(analysis::analyze))
        .route("/analysis/reports", get(analysis::list_reports))
        .route("/analysis/reports/:report_id", get(analysis::get_report))
        .route(
            "/analysis/generate-pdf/:report_id",
            post(analysis::generate_pdf),
        )
        .route(
            "/analysis/profiles",
            get(analysis::list_profiles).post(analysis::create_profile),
        )
        .with_state(state)
        .layer(cors(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allow_origin(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// `*` echoes the caller's origin back; a literal wildcard can't be combined with credentials.
fn allow_origin(allowed_origins: &[String]) -> AllowOrigin {
    if allowed_origins.iter().any(|o| o.trim() == "*") {
        return AllowOrigin::mirror_request();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(origins)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to Stratify AI",
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "auth": "/auth",
            "analysis": "/analysis",
        },
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "Stratify AI Backend",
    }))
}

async fn healthz() -> &'static str {
    "ok"
}
