use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;

use crate::jwt::validate_token;

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub fn extract_user<B>(request: &Request<B>) -> Result<User, AppError> {
    request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}

/// Resolve the caller's clinic role and reject it unless it is one of `allowed`.
pub fn require_role(user: &User, allowed: &[UserRole]) -> Result<UserRole, AppError> {
    let role = user.clinic_role();
    if allowed.contains(&role) {
        Ok(role)
    } else {
        Err(AppError::Forbidden(format!("Role '{}' is not permitted to perform this action", role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestUser;

    #[test]
    fn test_require_role() {
        let doctor = TestUser::doctor("doc@example.com").to_user();
        let patient = TestUser::patient("p@example.com").to_user();

        assert_eq!(require_role(&doctor, &[UserRole::Doctor]).unwrap(), UserRole::Doctor);
        assert!(matches!(
            require_role(&patient, &[UserRole::Doctor]),
            Err(AppError::Forbidden(_))
        ));
        assert!(require_role(&patient, &[UserRole::Doctor, UserRole::Patient]).is_ok());
    }

    #[test]
    fn test_extract_user_from_extensions() {
        let mut request = Request::new(Body::empty());
        assert!(extract_user(&request).is_err());

        request.extensions_mut().insert(TestUser::patient("p@example.com").to_user());
        assert_eq!(extract_user(&request).unwrap().email.as_deref(), Some("p@example.com"));
    }
}
