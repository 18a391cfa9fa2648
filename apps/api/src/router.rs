use std::sync::Arc;

use axum::{
    Json,
    Router,
    routing::get,
};
use serde_json::{json, Value};

use appointment_cell::{announcement_routes, appointment_routes};
use patient_cell::patient_routes;
use scribe_cell::scribe_routes;
use shared_config::AppConfig;
use shared_database::RealtimeHub;

async fn health_check(config: Arc<AppConfig>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "database_configured": config.is_configured(),
        "scribe_configured": config.is_scribe_configured(),
    }))
}

pub fn create_router(state: Arc<AppConfig>) -> Router {
    // Appointment and announcement changes fan out through one hub.
    let hub = RealtimeHub::new();
    let health_config = state.clone();

    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .route("/health", get(move || health_check(health_config.clone())))
        .nest("/appointments", appointment_routes(state.clone(), hub.clone()))
        .nest("/announcements", announcement_routes(state.clone(), hub))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/scribe", scribe_routes(state))
}
