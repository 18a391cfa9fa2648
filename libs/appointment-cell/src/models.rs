// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use patient_cell::models::CreatePatientRequest;

/// Maximum number of non-cancelled appointments per (date, time) slot.
pub const SLOT_CAPACITY: usize = 5;

// ==============================================================================
// TIME BUCKETS
// ==============================================================================

/// The clinic's fixed set of bookable time-of-day buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeBucket {
    #[serde(rename = "08:00 AM")]
    EightAm,
    #[serde(rename = "09:00 AM")]
    NineAm,
    #[serde(rename = "10:00 AM")]
    TenAm,
    #[serde(rename = "11:00 AM")]
    ElevenAm,
    #[serde(rename = "01:00 PM")]
    OnePm,
    #[serde(rename = "02:00 PM")]
    TwoPm,
    #[serde(rename = "03:00 PM")]
    ThreePm,
    #[serde(rename = "04:00 PM")]
    FourPm,
}

impl TimeBucket {
    pub const ALL: [TimeBucket; 8] = [
        TimeBucket::EightAm,
        TimeBucket::NineAm,
        TimeBucket::TenAm,
        TimeBucket::ElevenAm,
        TimeBucket::OnePm,
        TimeBucket::TwoPm,
        TimeBucket::ThreePm,
        TimeBucket::FourPm,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TimeBucket::EightAm => "08:00 AM",
            TimeBucket::NineAm => "09:00 AM",
            TimeBucket::TenAm => "10:00 AM",
            TimeBucket::ElevenAm => "11:00 AM",
            TimeBucket::OnePm => "01:00 PM",
            TimeBucket::TwoPm => "02:00 PM",
            TimeBucket::ThreePm => "03:00 PM",
            TimeBucket::FourPm => "04:00 PM",
        }
    }

    /// Exact label match only; "9:00 AM" or "09:00" are not buckets.
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|bucket| bucket.label() == label)
    }

    /// Start hour on a 24-hour clock.
    pub fn hour(&self) -> u32 {
        match self {
            TimeBucket::EightAm => 8,
            TimeBucket::NineAm => 9,
            TimeBucket::TenAm => 10,
            TimeBucket::ElevenAm => 11,
            TimeBucket::OnePm => 13,
            TimeBucket::TwoPm => 14,
            TimeBucket::ThreePm => 15,
            TimeBucket::FourPm => 16,
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    /// Front-desk alias for a checked-in patient; counted like `Confirmed`.
    Waiting,
    #[serde(rename = "in-room")]
    InRoom,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Waiting => "waiting",
            AppointmentStatus::InRoom => "in-room",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// In the clinic's active queue.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Confirmed | AppointmentStatus::Waiting | AppointmentStatus::InRoom
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Everything except a cancellation occupies a seat in its slot.
    pub fn occupies_slot(&self) -> bool {
        *self != AppointmentStatus::Cancelled
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patient columns embedded by the queue board select.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSummary {
    pub name: String,
    pub guardian_name: Option<String>,
    pub contact_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    /// Raw slot label as stored; rows with unknown labels are kept but never counted.
    pub time: String,
    #[serde(default)]
    pub purpose: String,
    pub status: AppointmentStatus,
    pub doctor_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub queue_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientSummary>,
}

impl Appointment {
    pub fn bucket(&self) -> Option<TimeBucket> {
        TimeBucket::parse(&self.time)
    }

    pub fn in_slot(&self, date: NaiveDate, bucket: TimeBucket) -> bool {
        self.date == date && self.time == bucket.label()
    }

    pub fn patient_name(&self) -> &str {
        self.patient.as_ref().map(|p| p.name.as_str()).unwrap_or("")
    }
}

/// Row written by the booking flow; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time: TimeBucket,
    pub purpose: String,
    pub status: AppointmentStatus,
    pub doctor_name: String,
}

// ==============================================================================
// SLOT CAPACITY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotInfo {
    pub time: TimeBucket,
    pub count: usize,
    pub remaining: usize,
    pub capacity: usize,
    pub is_full: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub blocked_reason: Option<String>,
    pub slots: Vec<SlotInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Availability {
    pub date: NaiveDate,
    pub bookable: bool,
    pub reason: Option<String>,
}

// ==============================================================================
// ANNOUNCEMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementType {
    General,
    Alert,
    Promo,
    #[default]
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: AnnouncementType,
    /// Either a plain date or a timestamp; only the date part matters.
    pub date: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Announcement {
    pub fn date_part(&self) -> Option<NaiveDate> {
        let raw = self.date.as_deref()?.trim();
        let day = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub kind: Option<AnnouncementType>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<AnnouncementType>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnouncementRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Option<Uuid>,
    /// Registers a new patient when `patient_id` is absent.
    pub patient: Option<CreatePatientRequest>,
    pub date: NaiveDate,
    pub time: String,
    pub purpose: String,
    pub doctor_name: Option<String>,
}

impl BookAppointmentRequest {
    pub fn validate(&self) -> Result<TimeBucket, AppointmentError> {
        if self.purpose.trim().is_empty() {
            return Err(AppointmentError::Validation("Purpose of visit is required".to_string()));
        }
        if self.patient_id.is_none() && self.patient.is_none() {
            return Err(AppointmentError::Validation(
                "Either patient_id or new patient details are required".to_string(),
            ));
        }
        TimeBucket::parse(&self.time).ok_or_else(|| AppointmentError::InvalidTimeBucket(self.time.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// QUEUE BOARD
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueRange {
    Today,
    Tomorrow,
    Week,
    Custom(NaiveDate),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Active,
    Pending,
}

impl StatusFilter {
    pub fn matches(&self, status: AppointmentStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Completed => status == AppointmentStatus::Completed,
            StatusFilter::Active => status.is_active(),
            StatusFilter::Pending => status == AppointmentStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueQuery {
    pub range: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<StatusFilter>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSlot {
    pub time: TimeBucket,
    pub appointments: Vec<Appointment>,
    pub active_count: usize,
    pub cancelled_count: usize,
    pub capacity: usize,
    pub is_full: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueDay {
    pub date: NaiveDate,
    pub blocked_reason: Option<String>,
    pub slots: Vec<QueueSlot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueueStats {
    pub completed: usize,
    pub waiting: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HourlyTraffic {
    pub hour: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrafficSummary {
    pub hours: Vec<HourlyTraffic>,
    pub peak: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueBoard {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<QueueDay>,
    pub stats: QueueStats,
    pub traffic: TrafficSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub queued: usize,
    pub vaccines: usize,
    pub pending: usize,
    pub completed: usize,
}

// ==============================================================================
// PATIENT PORTAL
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PortalView {
    #[default]
    Upcoming,
    History,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortalQuery {
    pub view: Option<PortalView>,
    #[serde(default)]
    pub hide_completed: bool,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("The {time} slot on {date} is full ({capacity} patients)")]
    SlotFull {
        date: NaiveDate,
        time: TimeBucket,
        capacity: usize,
    },

    #[error("Cannot change status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    Blackout(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid time slot: {0}")]
    InvalidTimeBucket(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Appointment not found")]
    NotFound,
}
