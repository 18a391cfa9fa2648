use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::handlers::*;
use patient_cell::models::{CreatePatientRequest, PatientSearchQuery};
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

#[tokio::test]
async fn test_guardian_creates_child_with_session_contact() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    let guardian = TestUser::patient("ana@example.com");
    let token = JwtTestUtils::create_test_token(&guardian, &config.supabase_jwt_secret, Some(1));
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(header("Authorization", format!("Bearer {}", token)))
        .and(body_partial_json(json!({
            "name": "Lia",
            "email": "ana@example.com",
            "contact_number": "09170000000",
            "guardian_name": "Test Guardian"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, "Lia", "ana@example.com")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = CreatePatientRequest {
        name: "  Lia ".to_string(),
        dob: NaiveDate::from_ymd_opt(2021, 3, 15).unwrap(),
        gender: Some("female".to_string()),
        guardian_name: None,
        contact_number: None,
        email: None,
    };

    let response = create_patient(
        State(Arc::new(config)),
        create_auth_header(&token),
        Extension(guardian.to_user()),
        Json(request),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(response["patient"]["id"], patient_id);
    assert_eq!(response["patient"]["name"], "Lia");
    assert!(response["age"].as_str().unwrap().ends_with("yr. old"));
}

#[tokio::test]
async fn test_create_patient_rejects_future_birth_date() {
    let config = TestConfig::default().to_app_config();
    let guardian = TestUser::patient("ana@example.com");

    let request = CreatePatientRequest {
        name: "Lia".to_string(),
        dob: NaiveDate::from_ymd_opt(2999, 1, 1).unwrap(),
        gender: None,
        guardian_name: None,
        contact_number: None,
        email: None,
    };

    let result = create_patient(
        State(Arc::new(config)),
        create_auth_header("token"),
        Extension(guardian.to_user()),
        Json(request),
    )
    .await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn test_guardian_cannot_view_other_family_patient() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient_id = Uuid::new_v4();

    let mut other_family = MockSupabaseResponses::patient_response(
        &patient_id.to_string(),
        "Miguel",
        "someone-else@example.com",
    );
    other_family["contact_number"] = json!("09990000000");

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([other_family])))
        .mount(&mock_server)
        .await;

    let result = get_patient(
        State(Arc::new(config)),
        create_auth_header("token"),
        Extension(TestUser::patient("ana@example.com").to_user()),
        Path(patient_id),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_get_missing_patient_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = get_patient(
        State(Arc::new(config)),
        create_auth_header("token"),
        Extension(TestUser::doctor("doc@example.com").to_user()),
        Path(Uuid::new_v4()),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn test_my_patients_matches_email_or_phone() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("or", "(email.eq.ana@example.com,contact_number.eq.09170000000)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&Uuid::new_v4().to_string(), "Lia", "ana@example.com"),
            MockSupabaseResponses::patient_response(&Uuid::new_v4().to_string(), "Noel", "ana@example.com")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = get_my_patients(
        State(Arc::new(config)),
        create_auth_header("token"),
        Extension(TestUser::patient("ana@example.com").to_user()),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(response["total"], 2);
    assert_eq!(response["patients"][1]["patient"]["name"], "Noel");
}

#[tokio::test]
async fn test_search_is_doctor_only() {
    let config = TestConfig::default().to_app_config();

    let result = search_patients(
        State(Arc::new(config)),
        create_auth_header("token"),
        Extension(TestUser::patient("ana@example.com").to_user()),
        Query(PatientSearchQuery::default()),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_doctor_search_by_name() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("name", "ilike.*lia*"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&Uuid::new_v4().to_string(), "Lia", "ana@example.com")
        ])))
        .mount(&mock_server)
        .await;

    let response = search_patients(
        State(Arc::new(config)),
        create_auth_header("token"),
        Extension(TestUser::doctor("doc@example.com").to_user()),
        Query(PatientSearchQuery {
            name: Some("lia".to_string()),
            limit: Some(10),
        }),
    )
    .await
    .unwrap()
    .0;

    assert_eq!(response["total"], 1);
}
