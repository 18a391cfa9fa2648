use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{GenerateSoapRequest, GenerateSoapResponse, NotesQuery, SaveSoapNoteRequest, ScribeError};
use crate::services::{GeminiScribe, SoapNoteService};

pub fn map_scribe_error(error: ScribeError) -> AppError {
    match error {
        ScribeError::Api(msg) | ScribeError::InvalidResponse(msg) => AppError::ExternalService(msg),
        ScribeError::Validation(msg) => AppError::ValidationError(msg),
        ScribeError::Persistence(msg) => AppError::Database(msg),
    }
}

fn note_service(config: &AppConfig) -> SoapNoteService {
    SoapNoteService::new(Arc::new(SupabaseClient::new(config)))
}

#[axum::debug_handler]
pub async fn generate_soap_note(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateSoapRequest>,
) -> Result<Json<GenerateSoapResponse>, AppError> {
    require_role(&user, &[UserRole::Doctor])?;

    let note = GeminiScribe::new(&config)
        .generate_soap_note(&request.transcript)
        .await;

    Ok(Json(GenerateSoapResponse {
        generated: !note.is_placeholder(),
        note,
    }))
}

#[axum::debug_handler]
pub async fn save_soap_note(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SaveSoapNoteRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Doctor])?;

    let note = note_service(&config)
        .save(request, &config.clinic_doctor_name, auth.token())
        .await
        .map_err(map_scribe_error)?;

    Ok(Json(json!(note)))
}

#[axum::debug_handler]
pub async fn list_soap_notes(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<NotesQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Doctor])?;

    let notes = note_service(&config)
        .list(query.patient_id, auth.token())
        .await
        .map_err(map_scribe_error)?;

    Ok(Json(json!({
        "notes": notes,
        "total": notes.len(),
    })))
}
