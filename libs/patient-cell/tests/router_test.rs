use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use patient_cell::patient_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

#[tokio::test]
async fn test_routes_require_bearer_token() {
    let app = patient_routes(TestConfig::default().to_arc());

    let response = app
        .oneshot(Request::builder().uri("/mine").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let config = TestConfig::default();
    let token = JwtTestUtils::create_expired_token(&TestUser::doctor("doc@example.com"), &config.jwt_secret);
    let app = patient_routes(config.to_arc());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/search?name=lia")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_patient_role_cannot_search() {
    let config = TestConfig::default();
    let token = JwtTestUtils::create_test_token(&TestUser::patient("ana@example.com"), &config.jwt_secret, Some(1));
    let app = patient_routes(config.to_arc());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/search")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_token_is_rejected() {
    let app = patient_routes(TestConfig::default().to_arc());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/mine")
                .header("Authorization", format!("Bearer {}", JwtTestUtils::create_malformed_token()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
