use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn scribe_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/generate", post(handlers::generate_soap_note))
        .route("/notes", post(handlers::save_soap_note).get(handlers::list_soap_notes))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
