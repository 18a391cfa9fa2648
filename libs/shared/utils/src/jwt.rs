use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use shared_models::auth::{JwtClaims, JwtHeader, User};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("JWT secret is not set")]
    MissingSecret,

    #[error("Invalid token format")]
    Malformed,

    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Invalid claims format")]
    BadClaims,

    #[error("Token expired")]
    Expired,
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, JwtError> {
    if jwt_secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }

    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(c), Some(s), None) => (h, c, s),
        _ => return Err(JwtError::Malformed),
    };

    let header: JwtHeader = decode_segment(header_b64)?;
    if header.alg != "HS256" {
        return Err(JwtError::UnsupportedAlgorithm(header.alg));
    }

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        JwtError::BadSignature
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| JwtError::MissingSecret)?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err(JwtError::BadSignature);
    }

    let claims: JwtClaims = decode_segment(claims_b64)?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp().max(0) as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err(JwtError::Expired);
        }
    }

    let created_at = claims.iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let role = clinic_role_claim(&claims);
    let metadata = merge_metadata(claims.user_metadata, claims.phone);

    let user = User {
        id: claims.sub,
        email: claims.email,
        role,
        metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, JwtError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|_| JwtError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        debug!("Failed to parse token segment: {}", e);
        JwtError::BadClaims
    })
}

// Supabase signs every session as "authenticated"; the clinic role lives in metadata.
fn clinic_role_claim(claims: &JwtClaims) -> Option<String> {
    let from_meta = |meta: &Option<Value>| {
        meta.as_ref()
            .and_then(|m| m.get("role"))
            .and_then(|r| r.as_str())
            .map(str::to_string)
    };

    from_meta(&claims.app_metadata)
        .or_else(|| from_meta(&claims.user_metadata))
        .or_else(|| claims.role.clone())
}

fn merge_metadata(user_metadata: Option<Value>, phone: Option<String>) -> Option<Value> {
    match (user_metadata, phone) {
        (Some(Value::Object(mut map)), Some(phone)) if !phone.is_empty() => {
            map.entry("phone").or_insert(Value::String(phone));
            Some(Value::Object(map))
        }
        (None, Some(phone)) if !phone.is_empty() => {
            Some(serde_json::json!({ "phone": phone }))
        }
        (meta, _) => meta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn test_valid_token_round_trip() {
        let user = TestUser::doctor("doc@example.com");
        let token = JwtTestUtils::create_test_token(&user, SECRET, Some(1));

        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.role.as_deref(), Some("doctor"));
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let user = TestUser::patient("p@example.com");
        let token = JwtTestUtils::create_invalid_signature_token(&user);
        assert_eq!(validate_token(&token, SECRET), Err(JwtError::BadSignature));
    }

    #[test]
    fn test_rejects_expired() {
        let user = TestUser::patient("p@example.com");
        let token = JwtTestUtils::create_expired_token(&user, SECRET);
        assert_eq!(validate_token(&token, SECRET), Err(JwtError::Expired));
    }

    #[test]
    fn test_rejects_malformed_and_missing_secret() {
        assert_eq!(validate_token("a.b", SECRET), Err(JwtError::Malformed));
        assert_eq!(validate_token("a.b.c", ""), Err(JwtError::MissingSecret));
    }

    #[test]
    fn test_metadata_role_wins_over_claim() {
        let user = TestUser::new("g@example.com", "authenticated");
        let token = JwtTestUtils::create_token_with_metadata(
            &user,
            SECRET,
            serde_json::json!({ "role": "patient", "full_name": "Ana Cruz" }),
        );

        let validated = validate_token(&token, SECRET).unwrap();
        assert_eq!(validated.role.as_deref(), Some("patient"));
        assert_eq!(validated.full_name().as_deref(), Some("Ana Cruz"));
    }
}
