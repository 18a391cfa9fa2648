use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::{SaveSoapNoteRequest, ScribeError, StoredSoapNote};

pub const SOAP_NOTES_TABLE: &str = "soap_notes";

pub struct SoapNoteService {
    supabase: Arc<SupabaseClient>,
}

impl SoapNoteService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn save(
        &self,
        request: SaveSoapNoteRequest,
        doctor_name: &str,
        auth_token: &str,
    ) -> Result<StoredSoapNote, ScribeError> {
        let note = &request.note;
        if [&note.subjective, &note.objective, &note.assessment, &note.plan]
            .iter()
            .all(|section| section.trim().is_empty())
        {
            return Err(ScribeError::Validation("SOAP note is empty".to_string()));
        }

        let row = json!({
            "patient_id": request.patient_id,
            "appointment_id": request.appointment_id,
            "doctor_name": doctor_name,
            "subjective": note.subjective,
            "objective": note.objective,
            "assessment": note.assessment,
            "plan": note.plan,
            "diagnosis": request.diagnosis,
        });

        let stored: StoredSoapNote = self.supabase
            .insert(SOAP_NOTES_TABLE, row, Some(auth_token))
            .await
            .map_err(|e| ScribeError::Persistence(e.to_string()))?;

        info!("SOAP note {} saved for patient {}", stored.id, stored.patient_id);
        Ok(stored)
    }

    /// Saved notes, newest first, optionally for one patient.
    pub async fn list(
        &self,
        patient_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<StoredSoapNote>, ScribeError> {
        debug!("Listing SOAP notes (patient: {:?})", patient_id);

        let mut query = PostgrestQuery::new();
        if let Some(id) = patient_id {
            query = query.eq("patient_id", id);
        }
        let query = query.order("created_at", false);

        self.supabase
            .select(SOAP_NOTES_TABLE, &query, Some(auth_token))
            .await
            .map_err(|e| ScribeError::Persistence(e.to_string()))
    }
}
