// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ChangeKind, RealtimeHub};

use crate::models::{
    Announcement, Appointment, AppointmentError, AppointmentStatus, NewAppointment, SlotInfo,
    TimeBucket, SLOT_CAPACITY,
};
use crate::services::availability::is_date_bookable;
use crate::services::capacity::remaining_capacity;
use crate::services::consistency::SlotLocks;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::store::{AppointmentStore, APPOINTMENTS_TABLE};

/// A booking for a patient who already has a record.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time: TimeBucket,
    pub purpose: String,
    pub doctor_name: Option<String>,
}

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    locks: SlotLocks,
    hub: Option<RealtimeHub>,
    lifecycle: AppointmentLifecycleService,
    serialize_slot_writes: bool,
    doctor_name: String,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn AppointmentStore>, locks: SlotLocks, config: &AppConfig) -> Self {
        Self {
            store,
            locks,
            hub: None,
            lifecycle: AppointmentLifecycleService::new(),
            serialize_slot_writes: config.serialize_slot_writes,
            doctor_name: config.clinic_doctor_name.clone(),
        }
    }

    pub fn with_hub(mut self, hub: RealtimeHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Blackout and capacity check without writing anything.
    pub async fn check_slot(
        &self,
        date: NaiveDate,
        time: TimeBucket,
        announcements: &[Announcement],
    ) -> Result<SlotInfo, AppointmentError> {
        if let Some(reason) = is_date_bookable(date, announcements) {
            return Err(AppointmentError::Blackout(reason));
        }

        let existing = self.store.list_slot(date, time).await?;
        let slot = remaining_capacity(date, time, &existing);

        if slot.is_full {
            warn!("Slot {} {} is full ({}/{})", date, time, slot.count, SLOT_CAPACITY);
            return Err(AppointmentError::SlotFull {
                date,
                time,
                capacity: SLOT_CAPACITY,
            });
        }

        Ok(slot)
    }

    /// Capacity-checked insert of a new `pending` appointment.
    #[instrument(skip(self, booking, announcements), fields(date = %booking.date, time = %booking.time))]
    pub async fn create_appointment(
        &self,
        booking: NewBooking,
        announcements: &[Announcement],
    ) -> Result<Appointment, AppointmentError> {
        if booking.purpose.trim().is_empty() {
            return Err(AppointmentError::Validation("Purpose of visit is required".to_string()));
        }

        let slot_guard = if self.serialize_slot_writes {
            Some(self.locks.acquire(booking.date, booking.time).await)
        } else {
            None
        };

        let slot = self.check_slot(booking.date, booking.time, announcements).await?;
        debug!("Slot has {} of {} seats left", slot.remaining, slot.capacity);

        let row = NewAppointment {
            patient_id: booking.patient_id,
            date: booking.date,
            time: booking.time,
            purpose: booking.purpose.trim().to_string(),
            status: AppointmentStatus::Pending,
            doctor_name: booking
                .doctor_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| self.doctor_name.clone()),
        };

        let appointment = self.store.insert(&row).await?;
        drop(slot_guard);

        info!("Appointment {} booked for patient {}", appointment.id, appointment.patient_id);
        self.publish(ChangeKind::Insert, &appointment).await;

        Ok(appointment)
    }

    /// Move an appointment along its lifecycle; invalid edges leave the row untouched.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.store.get(appointment_id).await?;
        self.lifecycle.validate_status_transition(current.status, new_status)?;

        let mut updated = self.store.update_status(appointment_id, new_status).await?;
        if updated.patient.is_none() {
            updated.patient = current.patient;
        }

        info!("Appointment {} moved {} -> {}", appointment_id, current.status, new_status);
        self.publish(ChangeKind::Update, &updated).await;

        Ok(updated)
    }

    async fn publish(&self, kind: ChangeKind, appointment: &Appointment) {
        let Some(hub) = &self.hub else { return };

        match serde_json::to_value(appointment) {
            Ok(record) => {
                hub.publish(APPOINTMENTS_TABLE, kind, record).await;
            }
            Err(e) => warn!("Could not serialize appointment {} for realtime: {}", appointment.id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use futures::future::join_all;

    use crate::models::AnnouncementType;
    use crate::services::capacity::test_support::{appointment, date};
    use crate::services::store::InMemoryAppointmentStore;

    fn booking(day: NaiveDate, time: TimeBucket) -> NewBooking {
        NewBooking {
            patient_id: Uuid::new_v4(),
            date: day,
            time,
            purpose: "Check-up".to_string(),
            doctor_name: None,
        }
    }

    fn service(store: &InMemoryAppointmentStore, serialize: bool) -> AppointmentBookingService {
        let config = AppConfig {
            serialize_slot_writes: serialize,
            ..AppConfig::default()
        };
        AppointmentBookingService::new(Arc::new(store.clone()), SlotLocks::new(), &config)
    }

    #[tokio::test]
    async fn test_sixth_booking_in_full_slot_is_rejected() {
        let day = date(2024, 6, 10);
        let store = InMemoryAppointmentStore::with_rows(
            (0..5).map(|_| appointment(day, "09:00 AM", AppointmentStatus::Confirmed)).collect(),
        );

        let result = service(&store, true).create_appointment(booking(day, TimeBucket::NineAm), &[]).await;

        assert_matches!(
            result,
            Err(AppointmentError::SlotFull { time: TimeBucket::NineAm, capacity: 5, .. })
        );
        assert_eq!(store.snapshot().await.len(), 5);
    }

    #[tokio::test]
    async fn test_fifth_seat_books_as_pending_with_default_doctor() {
        let day = date(2024, 6, 10);
        let store = InMemoryAppointmentStore::with_rows(
            (0..4).map(|_| appointment(day, "09:00 AM", AppointmentStatus::Pending)).collect(),
        );
        let service = service(&store, true);

        let booked = service.create_appointment(booking(day, TimeBucket::NineAm), &[]).await.unwrap();
        assert_eq!(booked.status, AppointmentStatus::Pending);
        assert_eq!(booked.doctor_name.as_deref(), Some("Dr. Atamosa"));
        assert_eq!(booked.time, "09:00 AM");

        let slot = remaining_capacity(day, TimeBucket::NineAm, &store.snapshot().await);
        assert_eq!(slot.count, 5);
        assert!(slot.is_full);
    }

    #[tokio::test]
    async fn test_cancelled_rows_do_not_block_booking() {
        let day = date(2024, 6, 10);
        let mut rows: Vec<_> = (0..5).map(|_| appointment(day, "10:00 AM", AppointmentStatus::Pending)).collect();
        rows[2].status = AppointmentStatus::Cancelled;
        let store = InMemoryAppointmentStore::with_rows(rows);

        assert!(service(&store, true).create_appointment(booking(day, TimeBucket::TenAm), &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_blackout_rejects_before_insert() {
        let store = InMemoryAppointmentStore::new();
        let service = service(&store, true);

        let sunday = service.create_appointment(booking(date(2024, 6, 9), TimeBucket::EightAm), &[]).await;
        assert_matches!(sunday, Err(AppointmentError::Blackout(reason)) if reason == "Clinic is closed on Sundays.");

        let closure = Announcement {
            id: Uuid::new_v4(),
            title: "Clinic Closed".to_string(),
            content: String::new(),
            kind: AnnouncementType::Alert,
            date: Some("2024-06-11".to_string()),
            created_at: None,
            edited_at: None,
        };
        let holiday = service.create_appointment(booking(date(2024, 6, 11), TimeBucket::EightAm), &[closure]).await;
        assert_matches!(holiday, Err(AppointmentError::Blackout(reason)) if reason == "Notice: Clinic Closed");

        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_bookings_never_overfill_a_slot() {
        let day = date(2024, 6, 10);
        let store = InMemoryAppointmentStore::with_rows(
            (0..3).map(|_| appointment(day, "01:00 PM", AppointmentStatus::Confirmed)).collect(),
        );
        let service = service(&store, true);

        let attempts = (0..8).map(|_| service.create_appointment(booking(day, TimeBucket::OnePm), &[]));
        let results = join_all(attempts).await;

        let booked = results.iter().filter(|r| r.is_ok()).count();
        let full = results
            .iter()
            .filter(|r| matches!(r, Err(AppointmentError::SlotFull { .. })))
            .count();
        assert_eq!(booked, 2);
        assert_eq!(full, 6);
        assert_eq!(remaining_capacity(day, TimeBucket::OnePm, &store.snapshot().await).count, 5);
    }

    #[tokio::test]
    async fn test_booking_is_published_to_subscribers() {
        let hub = RealtimeHub::new();
        let mut changes = hub.subscribe(APPOINTMENTS_TABLE, None).await;
        let store = InMemoryAppointmentStore::new();
        let service = service(&store, true).with_hub(hub);

        let booked = service.create_appointment(booking(date(2024, 6, 10), TimeBucket::EightAm), &[]).await.unwrap();

        let event = changes.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.record["id"], booked.id.to_string());
        assert_eq!(event.record["status"], "pending");
    }

    #[tokio::test]
    async fn test_transition_follows_lifecycle() {
        let day = date(2024, 6, 10);
        let in_room = appointment(day, "09:00 AM", AppointmentStatus::InRoom);
        let id = in_room.id;
        let store = InMemoryAppointmentStore::with_rows(vec![in_room]);
        let service = service(&store, true);

        assert_matches!(
            service.transition(id, AppointmentStatus::Pending).await,
            Err(AppointmentError::InvalidTransition { .. })
        );
        assert_eq!(store.get(id).await.unwrap().status, AppointmentStatus::InRoom);

        let completed = service.transition(id, AppointmentStatus::Completed).await.unwrap();
        assert_eq!(completed.status, AppointmentStatus::Completed);

        assert_matches!(
            service.transition(id, AppointmentStatus::Cancelled).await,
            Err(AppointmentError::InvalidTransition { .. })
        );
    }

    #[tokio::test]
    async fn test_transition_of_unknown_appointment_is_not_found() {
        let store = InMemoryAppointmentStore::new();
        assert_matches!(
            service(&store, true).transition(Uuid::new_v4(), AppointmentStatus::Confirmed).await,
            Err(AppointmentError::NotFound)
        );
    }
}
