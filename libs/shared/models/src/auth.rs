use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Role used for routing decisions; anything unrecognised is treated as public.
    pub fn clinic_role(&self) -> UserRole {
        self.role.as_deref().map(UserRole::from_claim).unwrap_or(UserRole::Public)
    }

    pub fn full_name(&self) -> Option<String> {
        self.metadata_str("full_name")
    }

    pub fn phone_number(&self) -> Option<String> {
        self.metadata_str("phone_number")
            .or_else(|| self.metadata_str("phone"))
    }

    fn metadata_str(&self, key: &str) -> Option<String> {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.get(key))
            .and_then(|value| value.as_str())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// The closed set of audiences the clinic serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Doctor,
    Patient,
    Public,
}

impl UserRole {
    pub fn from_claim(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "doctor" | "admin" => UserRole::Doctor,
            "patient" | "authenticated" => UserRole::Patient,
            _ => UserRole::Public,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Doctor => write!(f, "doctor"),
            UserRole::Patient => write!(f, "patient"),
            UserRole::Public => write!(f, "public"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_with(role: Option<&str>, metadata: Option<serde_json::Value>) -> User {
        User {
            id: "user-1".to_string(),
            email: Some("guardian@example.com".to_string()),
            role: role.map(str::to_string),
            metadata,
            created_at: None,
        }
    }

    #[test]
    fn test_role_from_claim() {
        assert_eq!(UserRole::from_claim("doctor"), UserRole::Doctor);
        assert_eq!(UserRole::from_claim("Admin"), UserRole::Doctor);
        assert_eq!(UserRole::from_claim("patient"), UserRole::Patient);
        assert_eq!(UserRole::from_claim("anon"), UserRole::Public);
    }

    #[test]
    fn test_missing_role_is_public() {
        assert_eq!(user_with(None, None).clinic_role(), UserRole::Public);
        assert_eq!(user_with(Some("doctor"), None).clinic_role(), UserRole::Doctor);
    }

    #[test]
    fn test_metadata_lookup() {
        let user = user_with(
            Some("patient"),
            Some(json!({ "full_name": "Maria Santos", "phone": "09171234567" })),
        );
        assert_eq!(user.full_name().as_deref(), Some("Maria Santos"));
        assert_eq!(user.phone_number().as_deref(), Some("09171234567"));
    }
}
