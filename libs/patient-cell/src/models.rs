use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::auth::User;

/// Pediatric patient record, linked to a guardian by email/contact number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub guardian_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub last_visit: Option<NaiveDate>,
    pub condition: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Patient {
    pub fn age_label(&self, today: NaiveDate) -> Option<String> {
        self.dob.map(|dob| age_label(dob, today))
    }

    /// Guardians are linked by the email or phone on their account.
    pub fn is_guardian(&self, user: &User) -> bool {
        let email_match = matches!(
            (&user.email, &self.email),
            (Some(a), Some(b)) if a.eq_ignore_ascii_case(b)
        );
        let phone_match = matches!(
            (user.phone_number(), &self.contact_number),
            (Some(a), Some(b)) if a == *b
        );
        email_match || phone_match
    }
}

/// "5 mo. old" under a year, "3 yr. old" otherwise.
pub fn age_label(dob: NaiveDate, today: NaiveDate) -> String {
    let mut years = today.year() - dob.year();
    let mut months = today.month() as i32 - dob.month() as i32;

    if months < 0 || (months == 0 && today.day() < dob.day()) {
        years -= 1;
        months += 12;
    }
    if today.day() < dob.day() && months > 0 {
        months -= 1;
    }

    if years <= 0 {
        format!("{} mo. old", months.max(0))
    } else {
        format!("{} yr. old", years)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    pub dob: NaiveDate,
    pub gender: Option<String>,
    pub guardian_name: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
}

impl CreatePatientRequest {
    /// Fill missing guardian fields from the signed-in guardian's account.
    pub fn fill_guardian_from(&mut self, user: &User) {
        if self.email.is_none() {
            self.email = user.email.clone();
        }
        if self.contact_number.is_none() {
            self.contact_number = user.phone_number();
        }
        if self.guardian_name.is_none() {
            self.guardian_name = user.full_name();
        }
    }

    pub fn validate(&self, today: NaiveDate) -> Result<(), PatientError> {
        if self.name.trim().is_empty() {
            return Err(PatientError::ValidationError("Patient name is required".to_string()));
        }
        if self.dob > today {
            return Err(PatientError::InvalidDateOfBirth);
        }
        if self.email.as_deref().map_or(true, str::is_empty)
            && self.contact_number.as_deref().map_or(true, str::is_empty)
        {
            return Err(PatientError::ValidationError(
                "A guardian email or contact number is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientSearchQuery {
    pub name: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Invalid date of birth")]
    InvalidDateOfBirth,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_label_months_for_infants() {
        assert_eq!(age_label(date(2024, 1, 10), date(2024, 6, 10)), "5 mo. old");
        assert_eq!(age_label(date(2024, 1, 20), date(2024, 6, 10)), "4 mo. old");
        assert_eq!(age_label(date(2024, 6, 1), date(2024, 6, 10)), "0 mo. old");
    }

    #[test]
    fn test_age_label_years() {
        assert_eq!(age_label(date(2021, 3, 15), date(2024, 6, 10)), "3 yr. old");
        assert_eq!(age_label(date(2021, 6, 11), date(2024, 6, 10)), "2 yr. old");
        assert_eq!(age_label(date(2023, 6, 10), date(2024, 6, 10)), "1 yr. old");
    }

    #[test]
    fn test_create_request_validation() {
        let today = date(2024, 6, 10);
        let mut request = CreatePatientRequest {
            name: "Lia".to_string(),
            dob: date(2022, 2, 2),
            gender: None,
            guardian_name: Some("Ana".to_string()),
            contact_number: None,
            email: Some("ana@example.com".to_string()),
        };
        assert!(request.validate(today).is_ok());

        request.dob = date(2025, 1, 1);
        assert!(matches!(request.validate(today), Err(PatientError::InvalidDateOfBirth)));

        request.dob = date(2022, 2, 2);
        request.email = None;
        assert!(matches!(request.validate(today), Err(PatientError::ValidationError(_))));
    }

    #[test]
    fn test_guardian_link_by_email_or_phone() {
        use shared_utils::test_utils::{MockSupabaseResponses, TestUser};

        let mut patient: Patient = serde_json::from_value(MockSupabaseResponses::patient_response(
            &Uuid::new_v4().to_string(),
            "Lia",
            "Ana@Example.com",
        ))
        .unwrap();
        let guardian = TestUser::patient("ana@example.com").to_user();
        assert!(patient.is_guardian(&guardian));

        patient.email = None;
        assert!(patient.is_guardian(&guardian), "phone 09170000000 still links");

        patient.contact_number = Some("09990000000".to_string());
        assert!(!patient.is_guardian(&guardian));
    }

    #[test]
    fn test_fill_guardian_keeps_explicit_values() {
        use shared_utils::test_utils::TestUser;

        let mut request = CreatePatientRequest {
            name: "Lia".to_string(),
            dob: date(2022, 2, 2),
            gender: None,
            guardian_name: Some("Ana Santos".to_string()),
            contact_number: None,
            email: None,
        };
        request.fill_guardian_from(&TestUser::patient("ana@example.com").to_user());

        assert_eq!(request.guardian_name.as_deref(), Some("Ana Santos"));
        assert_eq!(request.email.as_deref(), Some("ana@example.com"));
        assert_eq!(request.contact_number.as_deref(), Some("09170000000"));
    }
}
