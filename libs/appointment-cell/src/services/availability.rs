use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::{Announcement, AnnouncementType};

pub const SUNDAY_CLOSED_REASON: &str = "Clinic is closed on Sundays.";

/// `None` when the clinic takes bookings on `date`, otherwise the reason it does not.
pub fn is_date_bookable(date: NaiveDate, announcements: &[Announcement]) -> Option<String> {
    if date.weekday() == Weekday::Sun {
        return Some(SUNDAY_CLOSED_REASON.to_string());
    }

    announcements
        .iter()
        .find(|announcement| announcement.date_part() == Some(date) && is_closure(announcement))
        .map(|announcement| {
            let detail = if announcement.content.trim().is_empty() {
                &announcement.title
            } else {
                &announcement.content
            };
            format!("Notice: {}", detail)
        })
}

fn is_closure(announcement: &Announcement) -> bool {
    announcement.kind == AnnouncementType::Alert
        || announcement.title.to_lowercase().contains("closed")
}
