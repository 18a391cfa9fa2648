use chrono::NaiveDate;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{ChangeEvent, ChangeKind};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, SlotInfo, TimeBucket};
use crate::services::capacity::remaining_capacity;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::store::{AppointmentStore, APPOINTMENTS_TABLE};

/// Local snapshot of the appointment table kept current from realtime changes.
#[derive(Debug, Clone, Default)]
pub struct AppointmentBoard {
    appointments: Vec<Appointment>,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBoard {
    pub fn new(mut appointments: Vec<Appointment>) -> Self {
        sort(&mut appointments);
        Self {
            appointments,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn get(&self, id: Uuid) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    pub fn slot_info(&self, date: NaiveDate, time: TimeBucket) -> SlotInfo {
        remaining_capacity(date, time, &self.appointments)
    }

    /// Insert or replace a row by id, keeping date/time order.
    pub fn upsert(&mut self, appointment: Appointment) {
        match self.appointments.iter_mut().find(|a| a.id == appointment.id) {
            Some(existing) => {
                // Change payloads carry no embedded patient; keep the one we have.
                let patient = existing.patient.take();
                *existing = appointment;
                if existing.patient.is_none() {
                    existing.patient = patient;
                }
            }
            None => self.appointments.push(appointment),
        }
        sort(&mut self.appointments);
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Appointment> {
        let index = self.appointments.iter().position(|a| a.id == id)?;
        Some(self.appointments.remove(index))
    }

    /// Merge one change notification. Returns false when the event was ignored.
    pub fn apply_change(&mut self, event: &ChangeEvent) -> bool {
        if event.table != APPOINTMENTS_TABLE {
            return false;
        }

        match event.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                match serde_json::from_value::<Appointment>(event.record.clone()) {
                    Ok(appointment) => {
                        self.upsert(appointment);
                        true
                    }
                    Err(e) => {
                        warn!("Ignoring malformed appointment change: {}", e);
                        false
                    }
                }
            }
            ChangeKind::Delete => event
                .record
                .get("id")
                .and_then(|id| id.as_str())
                .and_then(|id| Uuid::parse_str(id).ok())
                .and_then(|id| self.remove(id))
                .is_some(),
        }
    }

    /// Apply a status change locally first, then persist it.
    /// A failed write restores the previous row and surfaces as `Persistence`.
    pub async fn update_status(
        &mut self,
        store: &dyn AppointmentStore,
        id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let previous = self.get(id).cloned().ok_or(AppointmentError::NotFound)?;
        self.lifecycle.validate_status_transition(previous.status, new_status)?;

        let mut patched = previous.clone();
        patched.status = new_status;
        self.upsert(patched);

        match store.update_status(id, new_status).await {
            Ok(saved) => {
                debug!("Appointment {} persisted as {}", id, new_status);
                self.upsert(saved.clone());
                Ok(saved)
            }
            Err(e) => {
                warn!("Status update for {} failed, rolling back: {}", id, e);
                self.upsert(previous);
                Err(match e {
                    AppointmentError::Persistence(msg) => AppointmentError::Persistence(msg),
                    other => AppointmentError::Persistence(other.to_string()),
                })
            }
        }
    }
}

fn sort(appointments: &mut [Appointment]) {
    appointments.sort_by(|a, b| {
        (a.date, a.bucket(), &a.time).cmp(&(b.date, b.bucket(), &b.time))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;

    use crate::models::PatientSummary;
    use crate::services::capacity::test_support::{appointment, date};
    use crate::services::store::InMemoryAppointmentStore;

    fn change(kind: ChangeKind, record: serde_json::Value) -> ChangeEvent {
        ChangeEvent {
            table: APPOINTMENTS_TABLE.to_string(),
            kind,
            record,
            committed_at: Utc::now(),
        }
    }

    #[test]
    fn test_changes_merge_by_id() {
        let day = date(2024, 6, 10);
        let mut first = appointment(day, "10:00 AM", AppointmentStatus::Pending);
        first.patient = Some(PatientSummary {
            name: "Lia".to_string(),
            guardian_name: None,
            contact_number: None,
        });
        let mut board = AppointmentBoard::new(vec![first.clone()]);

        let second = appointment(day, "08:00 AM", AppointmentStatus::Confirmed);
        assert!(board.apply_change(&change(ChangeKind::Insert, serde_json::to_value(&second).unwrap())));
        assert_eq!(board.appointments().len(), 2);
        assert_eq!(board.appointments()[0].id, second.id);

        let mut record = serde_json::to_value(&first).unwrap();
        record["status"] = json!("confirmed");
        record.as_object_mut().unwrap().remove("patient");
        assert!(board.apply_change(&change(ChangeKind::Update, record)));
        assert_eq!(board.appointments().len(), 2);
        let updated = board.get(first.id).unwrap();
        assert_eq!(updated.status, AppointmentStatus::Confirmed);
        assert_eq!(updated.patient_name(), "Lia");

        assert!(board.apply_change(&change(ChangeKind::Delete, json!({ "id": second.id.to_string() }))));
        assert_eq!(board.appointments().len(), 1);
    }

    #[test]
    fn test_other_tables_and_bad_payloads_are_ignored() {
        let mut board = AppointmentBoard::default();
        let mut event = change(ChangeKind::Insert, json!({ "id": "x" }));
        assert!(!board.apply_change(&event));

        event.table = "announcements".to_string();
        assert!(!board.apply_change(&event));
        assert!(board.appointments().is_empty());
    }

    #[test]
    fn test_slot_info_tracks_cancellations() {
        let day = date(2024, 6, 10);
        let pending = appointment(day, "09:00 AM", AppointmentStatus::Pending);
        let mut board = AppointmentBoard::new(vec![pending.clone()]);
        assert_eq!(board.slot_info(day, TimeBucket::NineAm).count, 1);

        let mut cancelled = pending;
        cancelled.status = AppointmentStatus::Cancelled;
        board.upsert(cancelled);
        assert_eq!(board.slot_info(day, TimeBucket::NineAm).count, 0);
    }

    #[tokio::test]
    async fn test_optimistic_update_persists() {
        let row = appointment(date(2024, 6, 10), "09:00 AM", AppointmentStatus::Confirmed);
        let store = InMemoryAppointmentStore::with_rows(vec![row.clone()]);
        let mut board = AppointmentBoard::new(vec![row.clone()]);

        let saved = board.update_status(&store, row.id, AppointmentStatus::InRoom).await.unwrap();
        assert_eq!(saved.status, AppointmentStatus::InRoom);
        assert_eq!(board.get(row.id).unwrap().status, AppointmentStatus::InRoom);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let row = appointment(date(2024, 6, 10), "09:00 AM", AppointmentStatus::Confirmed);
        let store = InMemoryAppointmentStore::with_rows(vec![row.clone()]);
        store.set_fail_writes(true);
        let mut board = AppointmentBoard::new(vec![row.clone()]);

        let result = board.update_status(&store, row.id, AppointmentStatus::InRoom).await;
        assert_matches!(result, Err(AppointmentError::Persistence(_)));
        assert_eq!(board.get(row.id).unwrap().status, AppointmentStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_invalid_edge_touches_nothing() {
        let row = appointment(date(2024, 6, 10), "09:00 AM", AppointmentStatus::Completed);
        let store = InMemoryAppointmentStore::with_rows(vec![row.clone()]);
        let mut board = AppointmentBoard::new(vec![row.clone()]);

        let result = board.update_status(&store, row.id, AppointmentStatus::Cancelled).await;
        assert_matches!(result, Err(AppointmentError::InvalidTransition { .. }));
        assert_eq!(board.get(row.id).unwrap().status, AppointmentStatus::Completed);
        assert_eq!(store.snapshot().await[0].status, AppointmentStatus::Completed);
    }
}
