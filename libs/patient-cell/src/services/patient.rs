use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::is_not_found;
use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::{CreatePatientRequest, Patient, PatientError, PatientSearchQuery};

const PATIENTS_TABLE: &str = "patients";

pub struct PatientService {
    supabase: Arc<SupabaseClient>,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        request.validate(Utc::now().date_naive())?;
        debug!("Creating patient record for guardian {:?}", request.guardian_name);

        let row = json!({
            "name": request.name.trim(),
            "dob": request.dob.format("%Y-%m-%d").to_string(),
            "gender": request.gender,
            "guardian_name": request.guardian_name,
            "contact_number": request.contact_number,
            "email": request.email,
        });

        let patient: Patient = self.supabase
            .insert(PATIENTS_TABLE, row, Some(auth_token))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        info!("Patient record {} created", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        debug!("Fetching patient {}", patient_id);

        let query = PostgrestQuery::new().eq("id", patient_id).limit(1);
        let patients: Vec<Patient> = self.supabase
            .select(PATIENTS_TABLE, &query, Some(auth_token))
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    PatientError::NotFound
                } else {
                    PatientError::DatabaseError(e.to_string())
                }
            })?;

        patients.into_iter().next().ok_or(PatientError::NotFound)
    }

    /// Children registered under a guardian, matched by email or contact number.
    pub async fn find_guardian_patients(
        &self,
        email: Option<&str>,
        contact_number: Option<&str>,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        let mut clauses = Vec::new();
        if let Some(email) = email.filter(|e| !e.is_empty()) {
            clauses.push(format!("email.eq.{}", email));
        }
        if let Some(contact) = contact_number.filter(|c| !c.is_empty()) {
            clauses.push(format!("contact_number.eq.{}", contact));
        }

        if clauses.is_empty() {
            return Ok(Vec::new());
        }

        let query = PostgrestQuery::new()
            .or(&clauses.join(","))
            .order("created_at", true);

        self.supabase
            .select(PATIENTS_TABLE, &query, Some(auth_token))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }

    pub async fn search_patients(
        &self,
        search: PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Searching patients with query: {:?}", search);

        let mut query = PostgrestQuery::new();
        if let Some(name) = search.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            query = query.ilike("name", name);
        }
        let query = query.order("name", true).limit(search.limit.unwrap_or(50));

        self.supabase
            .select(PATIENTS_TABLE, &query, Some(auth_token))
            .await
            .map_err(|e| PatientError::DatabaseError(e.to_string()))
    }
}
