// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_database::RealtimeHub;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(config: Arc<AppConfig>, hub: RealtimeHub) -> Router {
    let state = Arc::new(AppointmentState::new(config.clone(), hub));

    // Anyone can look at open slots before signing in
    let public_routes = Router::new()
        .route("/slots", get(handlers::get_day_slots))
        .route("/availability", get(handlers::get_availability));

    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/queue", get(handlers::get_queue))
        .route("/stats", get(handlers::get_dashboard_stats))
        .route("/mine", get(handlers::get_my_appointments))
        .route("/changes", get(handlers::stream_changes))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn announcement_routes(config: Arc<AppConfig>, hub: RealtimeHub) -> Router {
    let state = Arc::new(AppointmentState::new(config.clone(), hub));

    let public_routes = Router::new()
        .route("/", get(handlers::list_announcements))
        .route("/range", get(handlers::list_announcements_between));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_announcement))
        .route("/template", get(handlers::get_announcement_template))
        .route(
            "/{announcement_id}",
            patch(handlers::update_announcement).delete(handlers::delete_announcement),
        )
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
