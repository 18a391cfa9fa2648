use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::models::{
    Announcement, Appointment, AppointmentError, AppointmentStatus, DashboardStats, HourlyTraffic,
    PortalView, QueueBoard, QueueDay, QueueRange, QueueSlot, QueueStats, StatusFilter, TimeBucket,
    TrafficSummary, SLOT_CAPACITY,
};
use crate::services::availability::is_date_bookable;
use crate::services::capacity::{active_count, cancelled_count};

/// Hours shown on the traffic chart, 08:00 through 17:00.
const TRAFFIC_HOURS: std::ops::RangeInclusive<u32> = 8..=17;

impl QueueRange {
    pub fn parse(range: Option<&str>, date: Option<NaiveDate>) -> Result<Self, AppointmentError> {
        match (range.map(str::trim), date) {
            (None, None) | (Some("today"), _) => Ok(QueueRange::Today),
            (Some("tomorrow"), _) => Ok(QueueRange::Tomorrow),
            (Some("week"), _) => Ok(QueueRange::Week),
            (None, Some(day)) | (Some("custom"), Some(day)) => Ok(QueueRange::Custom(day)),
            (Some("custom"), None) => Err(AppointmentError::Validation(
                "A custom range needs a date".to_string(),
            )),
            (Some(other), _) => Err(AppointmentError::Validation(format!("Unknown range '{}'", other))),
        }
    }

    /// Inclusive `[start, end]`; a week is today plus the next six days.
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            QueueRange::Today => (today, today),
            QueueRange::Tomorrow => {
                let tomorrow = today + Duration::days(1);
                (tomorrow, tomorrow)
            }
            QueueRange::Week => (today, today + Duration::days(6)),
            QueueRange::Custom(day) => (*day, *day),
        }
    }
}

fn name_matches(appointment: &Appointment, needle: &str) -> bool {
    needle.is_empty() || appointment.patient_name().to_lowercase().contains(needle)
}

/// Doctor's queue for `[start, end]`: per-day, per-bucket lists with occupancy.
/// Occupancy ignores the status and name filters; they only narrow the lists.
pub fn build_queue_board(
    start: NaiveDate,
    end: NaiveDate,
    appointments: &[Appointment],
    announcements: &[Announcement],
    status_filter: StatusFilter,
    search: Option<&str>,
) -> QueueBoard {
    let needle = search.map(|s| s.trim().to_lowercase()).unwrap_or_default();

    let days = start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| {
            let slots = TimeBucket::ALL
                .iter()
                .map(|&bucket| {
                    let active = active_count(day, bucket, appointments);
                    QueueSlot {
                        time: bucket,
                        appointments: appointments
                            .iter()
                            .filter(|a| a.in_slot(day, bucket))
                            .filter(|a| status_filter.matches(a.status) && name_matches(a, &needle))
                            .cloned()
                            .collect(),
                        active_count: active,
                        cancelled_count: cancelled_count(day, bucket, appointments),
                        capacity: SLOT_CAPACITY,
                        is_full: active >= SLOT_CAPACITY,
                    }
                })
                .collect();

            QueueDay {
                date: day,
                blocked_reason: is_date_bookable(day, announcements),
                slots,
            }
        })
        .collect();

    QueueBoard {
        start,
        end,
        days,
        stats: queue_stats(appointments),
        traffic: hourly_traffic(appointments),
    }
}

pub fn queue_stats(appointments: &[Appointment]) -> QueueStats {
    appointments.iter().fold(QueueStats::default(), |mut stats, a| {
        match a.status {
            AppointmentStatus::Completed => stats.completed += 1,
            AppointmentStatus::Pending => stats.pending += 1,
            status if status.is_active() => stats.waiting += 1,
            _ => {}
        }
        stats
    })
}

/// Non-cancelled appointments per start hour, with the busiest hour's count.
pub fn hourly_traffic(appointments: &[Appointment]) -> TrafficSummary {
    let hours: Vec<HourlyTraffic> = TRAFFIC_HOURS
        .map(|hour| HourlyTraffic {
            hour,
            count: appointments
                .iter()
                .filter(|a| a.status.occupies_slot())
                .filter(|a| a.bucket().map(|b| b.hour()) == Some(hour))
                .count(),
        })
        .collect();

    let peak = hours.iter().map(|h| h.count).max().unwrap_or(0);
    TrafficSummary { hours, peak }
}

pub fn dashboard_stats(appointments: &[Appointment]) -> DashboardStats {
    appointments.iter().fold(DashboardStats::default(), |mut stats, a| {
        if a.status.is_active() {
            stats.queued += 1;
        }
        if a.purpose.to_lowercase().contains("vaccine") && !a.status.is_terminal() {
            stats.vaccines += 1;
        }
        match a.status {
            AppointmentStatus::Pending => stats.pending += 1,
            AppointmentStatus::Completed => stats.completed += 1,
            _ => {}
        }
        stats
    })
}

/// A guardian's view of their children's appointments.
pub fn portal_appointments(
    appointments: &[Appointment],
    child_ids: &[Uuid],
    view: PortalView,
    hide_completed: bool,
    today: NaiveDate,
) -> Vec<Appointment> {
    let children: HashSet<&Uuid> = child_ids.iter().collect();

    appointments
        .iter()
        .filter(|a| children.contains(&a.patient_id))
        .filter(|a| {
            let cancelled = a.status == AppointmentStatus::Cancelled;
            match view {
                PortalView::Upcoming => a.date >= today && !cancelled,
                PortalView::History => a.date < today || cancelled,
            }
        })
        .filter(|a| !(hide_completed && a.status == AppointmentStatus::Completed))
        .cloned()
        .collect()
}
