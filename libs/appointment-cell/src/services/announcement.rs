use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::supabase::is_not_found;
use shared_database::{PostgrestQuery, SupabaseClient};

use crate::models::{
    Announcement, AnnouncementType, AppointmentError, CreateAnnouncementRequest, UpdateAnnouncementRequest,
};

pub const ANNOUNCEMENTS_TABLE: &str = "announcements";

/// Ready-made announcement drafts for common clinic notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementTemplate {
    Closed,
    Vaccine,
}

impl AnnouncementTemplate {
    pub fn draft(&self, date: NaiveDate) -> CreateAnnouncementRequest {
        let day = date.format("%A, %B %-d").to_string();
        let (title, content, kind) = match self {
            AnnouncementTemplate::Closed => (
                format!("Clinic Closed - {}", day),
                format!(
                    "Please be advised that the clinic will be CLOSED on {}. Regular operations resume the following day.",
                    day
                ),
                AnnouncementType::Alert,
            ),
            AnnouncementTemplate::Vaccine => (
                format!("Vaccine Day: {}", day),
                format!("Upcoming Vaccine Day scheduled for {}. Please bring your baby's book.", day),
                AnnouncementType::Info,
            ),
        };

        CreateAnnouncementRequest {
            title,
            content,
            kind: Some(kind),
            date: Some(date.to_string()),
        }
    }
}

/// Blank dates are stored as null.
fn normalize_date(date: Option<&str>) -> Value {
    match date.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => json!(d),
        None => Value::Null,
    }
}

fn widened_bounds(from: NaiveDate, to: NaiveDate) -> (NaiveDate, String) {
    let lower = from.pred_opt().unwrap_or(from);
    let upper = to.succ_opt().unwrap_or(to);
    (lower, format!("{}T23:59:59", upper))
}

fn store_error(error: anyhow::Error) -> AppointmentError {
    if is_not_found(&error) {
        AppointmentError::NotFound
    } else {
        AppointmentError::Persistence(error.to_string())
    }
}

pub struct AnnouncementService {
    supabase: Arc<SupabaseClient>,
}

impl AnnouncementService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// All announcements, newest first.
    pub async fn list(&self, auth_token: Option<&str>) -> Result<Vec<Announcement>, AppointmentError> {
        let query = PostgrestQuery::new().order("created_at", false);
        self.supabase
            .select(ANNOUNCEMENTS_TABLE, &query, auth_token)
            .await
            .map_err(store_error)
    }

    /// Announcements dated within `[from, to]`.
    pub async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Announcement>, AppointmentError> {
        debug!("Fetching announcements between {} and {}", from, to);

        // Stored dates may be zoned timestamps, so fetch a day either side and
        // keep rows whose calendar day falls in range.
        let (lower, upper) = widened_bounds(from, to);
        let query = PostgrestQuery::new()
            .gte("date", lower)
            .lte("date", upper)
            .order("date", true);

        let rows: Vec<Announcement> = self.supabase
            .select(ANNOUNCEMENTS_TABLE, &query, auth_token)
            .await
            .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .filter(|a| a.date_part().is_some_and(|day| day >= from && day <= to))
            .collect())
    }

    pub async fn create(
        &self,
        request: CreateAnnouncementRequest,
        auth_token: &str,
    ) -> Result<Announcement, AppointmentError> {
        if request.title.trim().is_empty() {
            return Err(AppointmentError::Validation("Announcement title is required".to_string()));
        }

        let row = json!({
            "title": request.title.trim(),
            "content": request.content,
            "type": request.kind.unwrap_or_default(),
            "date": normalize_date(request.date.as_deref()),
        });

        let announcement: Announcement = self.supabase
            .insert(ANNOUNCEMENTS_TABLE, row, Some(auth_token))
            .await
            .map_err(store_error)?;

        info!("Announcement {} posted", announcement.id);
        Ok(announcement)
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateAnnouncementRequest,
        auth_token: &str,
    ) -> Result<Announcement, AppointmentError> {
        let mut patch = Map::new();
        if let Some(title) = request.title {
            if title.trim().is_empty() {
                return Err(AppointmentError::Validation("Announcement title is required".to_string()));
            }
            patch.insert("title".to_string(), json!(title.trim()));
        }
        if let Some(content) = request.content {
            patch.insert("content".to_string(), json!(content));
        }
        if let Some(kind) = request.kind {
            patch.insert("type".to_string(), json!(kind));
        }
        if let Some(date) = request.date {
            patch.insert("date".to_string(), normalize_date(Some(&date)));
        }
        patch.insert("edited_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.supabase
            .update_by_id(ANNOUNCEMENTS_TABLE, &id.to_string(), Value::Object(patch), Some(auth_token))
            .await
            .map_err(store_error)
    }

    pub async fn delete(&self, id: Uuid, auth_token: &str) -> Result<(), AppointmentError> {
        self.supabase
            .delete_by_id(ANNOUNCEMENTS_TABLE, &id.to_string(), Some(auth_token))
            .await
            .map_err(store_error)?;

        info!("Announcement {} deleted", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_dates_become_null() {
        assert_eq!(normalize_date(None), Value::Null);
        assert_eq!(normalize_date(Some("  ")), Value::Null);
        assert_eq!(normalize_date(Some("2024-06-11")), json!("2024-06-11"));
    }

    #[test]
    fn test_range_bounds_cover_neighbouring_days() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 11).unwrap();
        let (lower, upper) = widened_bounds(day, day);
        assert_eq!(lower, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
        assert_eq!(upper, "2024-06-12T23:59:59");
    }

    #[test]
    fn test_closed_template_is_an_alert_for_that_day() {
        let draft = AnnouncementTemplate::Closed.draft(NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());
        assert_eq!(draft.title, "Clinic Closed - Tuesday, June 11");
        assert_eq!(draft.kind, Some(AnnouncementType::Alert));
        assert_eq!(draft.date.as_deref(), Some("2024-06-11"));
    }

    #[test]
    fn test_vaccine_template_does_not_block_bookings() {
        let draft = AnnouncementTemplate::Vaccine.draft(NaiveDate::from_ymd_opt(2024, 6, 12).unwrap());
        assert_eq!(draft.title, "Vaccine Day: Wednesday, June 12");
        assert_eq!(draft.kind, Some(AnnouncementType::Info));
        assert!(!draft.title.to_lowercase().contains("closed"));
    }
}
