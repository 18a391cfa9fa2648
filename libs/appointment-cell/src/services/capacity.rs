use chrono::NaiveDate;

use crate::models::{
    Announcement, Appointment, AppointmentStatus, DaySchedule, SlotInfo, TimeBucket, SLOT_CAPACITY,
};
use crate::services::availability::is_date_bookable;

/// Non-cancelled appointments in the exact (date, bucket) slot.
pub fn active_count(date: NaiveDate, bucket: TimeBucket, appointments: &[Appointment]) -> usize {
    appointments
        .iter()
        .filter(|a| a.in_slot(date, bucket) && a.status.occupies_slot())
        .count()
}

pub fn cancelled_count(date: NaiveDate, bucket: TimeBucket, appointments: &[Appointment]) -> usize {
    appointments
        .iter()
        .filter(|a| a.in_slot(date, bucket) && a.status == AppointmentStatus::Cancelled)
        .count()
}

pub fn remaining_capacity(date: NaiveDate, bucket: TimeBucket, appointments: &[Appointment]) -> SlotInfo {
    let count = active_count(date, bucket, appointments);

    SlotInfo {
        time: bucket,
        count,
        remaining: SLOT_CAPACITY.saturating_sub(count),
        capacity: SLOT_CAPACITY,
        is_full: count >= SLOT_CAPACITY,
    }
}

/// Per-bucket capacity for a date. A blocked date lists no slots.
pub fn day_slots(date: NaiveDate, appointments: &[Appointment], announcements: &[Announcement]) -> DaySchedule {
    let blocked_reason = is_date_bookable(date, announcements);

    let slots = if blocked_reason.is_some() {
        Vec::new()
    } else {
        TimeBucket::ALL
            .iter()
            .map(|bucket| remaining_capacity(date, *bucket, appointments))
            .collect()
    };

    DaySchedule { date, blocked_reason, slots }
}


#[cfg(test)]
mod tests {
    use super::test_support::{appointment, date};
    use super::*;

    #[test]
    fn test_count_ignores_cancelled_other_slots_and_unknown_labels() {
        let day = date(2024, 6, 10);
        let appointments = vec![
            appointment(day, "09:00 AM", AppointmentStatus::Confirmed),
            appointment(day, "09:00 AM", AppointmentStatus::Completed),
            appointment(day, "09:00 AM", AppointmentStatus::Cancelled),
            appointment(day, "10:00 AM", AppointmentStatus::Pending),
            appointment(date(2024, 6, 11), "09:00 AM", AppointmentStatus::Pending),
            appointment(day, "9:00 AM", AppointmentStatus::Pending),
        ];

        let info = remaining_capacity(day, TimeBucket::NineAm, &appointments);
        assert_eq!(info.count, 2);
        assert_eq!(info.remaining, 3);
        assert!(!info.is_full);
        assert_eq!(cancelled_count(day, TimeBucket::NineAm, &appointments), 1);
    }

    #[test]
    fn test_five_active_fills_the_slot() {
        let day = date(2024, 6, 10);
        let appointments: Vec<_> = (0..5)
            .map(|_| appointment(day, "09:00 AM", AppointmentStatus::Confirmed))
            .collect();

        let info = remaining_capacity(day, TimeBucket::NineAm, &appointments);
        assert_eq!(info.count, 5);
        assert_eq!(info.remaining, 0);
        assert!(info.is_full);

        // Same snapshot, same answer.
        assert_eq!(info, remaining_capacity(day, TimeBucket::NineAm, &appointments));
    }

    #[test]
    fn test_cancelled_pending_frees_its_seat() {
        let day = date(2024, 6, 10);
        let mut appointments: Vec<_> = (0..5)
            .map(|_| appointment(day, "02:00 PM", AppointmentStatus::Pending))
            .collect();
        assert!(remaining_capacity(day, TimeBucket::TwoPm, &appointments).is_full);

        appointments[0].status = AppointmentStatus::Cancelled;
        let info = remaining_capacity(day, TimeBucket::TwoPm, &appointments);
        assert_eq!(info.count, 4);
        assert_eq!(info.remaining, 1);
    }

    #[test]
    fn test_day_slots_lists_every_bucket_in_order() {
        let day = date(2024, 6, 10);
        let schedule = day_slots(day, &[appointment(day, "08:00 AM", AppointmentStatus::Waiting)], &[]);

        assert_eq!(schedule.blocked_reason, None);
        assert_eq!(schedule.slots.len(), 8);
        assert_eq!(schedule.slots[0].time, TimeBucket::EightAm);
        assert_eq!(schedule.slots[0].count, 1);
        assert_eq!(schedule.slots[7].time, TimeBucket::FourPm);
    }

    #[test]
    fn test_day_slots_on_sunday_is_blocked() {
        let schedule = day_slots(date(2024, 6, 9), &[], &[]);
        assert_eq!(schedule.blocked_reason.as_deref(), Some("Clinic is closed on Sundays."));
        assert!(schedule.slots.is_empty());
    }
}
