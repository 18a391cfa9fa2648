use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::is_not_found;
use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, NewAppointment, TimeBucket};

pub const APPOINTMENTS_TABLE: &str = "appointments";
const WITH_PATIENT: &str = "*,patient:patients(name,guardian_name,contact_number)";

/// Data access for appointment rows. The booking core only talks to this trait.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Non-cancelled rows in one (date, time) slot.
    async fn list_slot(&self, date: NaiveDate, time: TimeBucket) -> Result<Vec<Appointment>, AppointmentError>;

    /// Rows with `start <= date <= end`, ordered by date then time, with the patient embedded.
    async fn list_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Appointment>, AppointmentError>;

    async fn list_for_patients(&self, patient_ids: &[Uuid]) -> Result<Vec<Appointment>, AppointmentError>;

    /// Every row, for clinic-wide counters.
    async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError>;

    async fn get(&self, id: Uuid) -> Result<Appointment, AppointmentError>;

    async fn insert(&self, appointment: &NewAppointment) -> Result<Appointment, AppointmentError>;

    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Appointment, AppointmentError>;
}

fn persistence_error(error: anyhow::Error) -> AppointmentError {
    if is_not_found(&error) {
        AppointmentError::NotFound
    } else {
        AppointmentError::Persistence(error.to_string())
    }
}

/// PostgREST-backed store acting with the caller's token (or the anon role).
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: Option<String>) -> Self {
        Self { supabase, auth_token }
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    async fn select(&self, query: PostgrestQuery) -> Result<Vec<Appointment>, AppointmentError> {
        self.supabase
            .select(APPOINTMENTS_TABLE, &query, self.token())
            .await
            .map_err(persistence_error)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn list_slot(&self, date: NaiveDate, time: TimeBucket) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Counting slot {} {}", date, time);
        self.select(
            PostgrestQuery::new()
                .eq("date", date)
                .eq("time", time.label())
                .neq("status", AppointmentStatus::Cancelled),
        )
        .await
    }

    async fn list_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        self.select(
            PostgrestQuery::new()
                .select(WITH_PATIENT)
                .gte("date", start)
                .lte("date", end)
                .order("date", true)
                .order("time", true),
        )
        .await
    }

    async fn list_for_patients(&self, patient_ids: &[Uuid]) -> Result<Vec<Appointment>, AppointmentError> {
        if patient_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.select(
            PostgrestQuery::new()
                .select(WITH_PATIENT)
                .in_list("patient_id", patient_ids)
                .order("date", true),
        )
        .await
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError> {
        self.select(PostgrestQuery::new().order("date", true)).await
    }

    async fn get(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.select(PostgrestQuery::new().select(WITH_PATIENT).eq("id", id).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or(AppointmentError::NotFound)
    }

    async fn insert(&self, appointment: &NewAppointment) -> Result<Appointment, AppointmentError> {
        let row = json!({
            "patient_id": appointment.patient_id,
            "date": appointment.date,
            "time": appointment.time,
            "purpose": appointment.purpose,
            "status": appointment.status,
            "doctor_name": appointment.doctor_name,
        });

        self.supabase
            .insert(APPOINTMENTS_TABLE, row, self.token())
            .await
            .map_err(persistence_error)
    }

    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Appointment, AppointmentError> {
        self.supabase
            .update_by_id(APPOINTMENTS_TABLE, &id.to_string(), json!({ "status": status }), self.token())
            .await
            .map_err(persistence_error)
    }
}

/// Process-local store used by tests and offline runs.
#[derive(Clone, Default)]
pub struct InMemoryAppointmentStore {
    rows: Arc<RwLock<Vec<Appointment>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Appointment>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows)),
            fail_writes: Arc::default(),
        }
    }

    /// Make every subsequent insert/update fail with a persistence error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Vec<Appointment> {
        self.rows.read().await.clone()
    }

    fn check_writable(&self) -> Result<(), AppointmentError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(AppointmentError::Persistence("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn list_slot(&self, date: NaiveDate, time: TimeBucket) -> Result<Vec<Appointment>, AppointmentError> {
        let rows = self
            .rows
            .read()
            .await
            .iter()
            .filter(|a| a.in_slot(date, time) && a.status.occupies_slot())
            .cloned()
            .collect();

        // Mimic the network round trip so concurrent bookings interleave.
        tokio::task::yield_now().await;
        Ok(rows)
    }

    async fn list_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        let mut rows: Vec<Appointment> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|a| a.date >= start && a.date <= end)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.date, &a.time).cmp(&(b.date, &b.time)));
        Ok(rows)
    }

    async fn list_for_patients(&self, patient_ids: &[Uuid]) -> Result<Vec<Appointment>, AppointmentError> {
        let mut rows: Vec<Appointment> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|a| patient_ids.contains(&a.patient_id))
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.date);
        Ok(rows)
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.snapshot().await)
    }

    async fn get(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.rows
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(AppointmentError::NotFound)
    }

    async fn insert(&self, appointment: &NewAppointment) -> Result<Appointment, AppointmentError> {
        self.check_writable()?;

        let row = Appointment {
            id: Uuid::new_v4(),
            patient_id: appointment.patient_id,
            date: appointment.date,
            time: appointment.time.label().to_string(),
            purpose: appointment.purpose.clone(),
            status: appointment.status,
            doctor_name: Some(appointment.doctor_name.clone()),
            created_at: Some(Utc::now()),
            queue_number: None,
            patient: None,
        };

        self.rows.write().await.push(row.clone());
        Ok(row)
    }

    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<Appointment, AppointmentError> {
        self.check_writable()?;

        let mut rows = self.rows.write().await;
        let row = rows.iter_mut().find(|a| a.id == id).ok_or(AppointmentError::NotFound)?;
        row.status = status;
        Ok(row.clone())
    }
}
