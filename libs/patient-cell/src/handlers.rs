use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{CreatePatientRequest, Patient, PatientError, PatientSearchQuery};
use crate::services::PatientService;

pub fn map_patient_error(error: PatientError) -> AppError {
    match error {
        PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
        PatientError::InvalidDateOfBirth => AppError::ValidationError(error.to_string()),
        PatientError::ValidationError(msg) => AppError::ValidationError(msg),
        PatientError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn patient_json(patient: &Patient) -> Value {
    json!({
        "patient": patient,
        "age": patient.age_label(Utc::now().date_naive()),
    })
}

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(mut request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let role = require_role(&user, &[UserRole::Doctor, UserRole::Patient])?;

    // Guardians register their own children.
    if role == UserRole::Patient {
        request.fill_guardian_from(&user);
    }

    let service = PatientService::new(&config);
    let patient = service.create_patient(request, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(patient_json(&patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let role = require_role(&user, &[UserRole::Doctor, UserRole::Patient])?;

    let service = PatientService::new(&config);
    let patient = service.get_patient(patient_id, auth.token())
        .await
        .map_err(map_patient_error)?;

    if role == UserRole::Patient && !patient.is_guardian(&user) {
        return Err(AppError::Forbidden("Not authorized to view this patient".to_string()));
    }

    Ok(Json(patient_json(&patient)))
}

#[axum::debug_handler]
pub async fn get_my_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Patient])?;

    let service = PatientService::new(&config);
    let phone = user.phone_number();
    let patients = service
        .find_guardian_patients(user.email.as_deref(), phone.as_deref(), auth.token())
        .await
        .map_err(map_patient_error)?;

    let children: Vec<Value> = patients.iter().map(patient_json).collect();
    Ok(Json(json!({
        "patients": children,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Doctor])?;

    let service = PatientService::new(&config);
    let patients = service.search_patients(query, auth.token())
        .await
        .map_err(map_patient_error)?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}
