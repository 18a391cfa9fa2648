// libs/appointment-cell/src/handlers.rs
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use futures::stream::{self, Stream};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use patient_cell::handlers::map_patient_error;
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_database::{ChangeFilter, ChangeKind, RealtimeHub, SupabaseClient};
use shared_models::auth::{User, UserRole};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    Announcement, AnnouncementRangeQuery, AppointmentError, Availability, BookAppointmentRequest,
    CreateAnnouncementRequest, DateQuery, PortalQuery, QueueQuery, QueueRange,
    UpdateAnnouncementRequest, UpdateStatusRequest,
};
use crate::services::announcement::{AnnouncementTemplate, ANNOUNCEMENTS_TABLE};
use crate::services::availability::is_date_bookable;
use crate::services::capacity::day_slots;
use crate::services::queue::{build_queue_board, dashboard_stats, portal_appointments};
use crate::services::store::APPOINTMENTS_TABLE;
use crate::services::{
    AnnouncementService, AppointmentBookingService, AppointmentStore, NewBooking, SlotLocks,
    SupabaseAppointmentStore,
};

// ==============================================================================
// SHARED STATE
// ==============================================================================

/// Per-process state shared by every appointment request.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub supabase: Arc<SupabaseClient>,
    pub hub: RealtimeHub,
    pub locks: SlotLocks,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, hub: RealtimeHub) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(&config)),
            config,
            hub,
            locks: SlotLocks::new(),
        }
    }

    fn store(&self, auth_token: Option<&str>) -> Arc<dyn AppointmentStore> {
        Arc::new(SupabaseAppointmentStore::new(
            self.supabase.clone(),
            auth_token.map(str::to_string),
        ))
    }

    fn booking(&self, auth_token: &str) -> AppointmentBookingService {
        AppointmentBookingService::new(self.store(Some(auth_token)), self.locks.clone(), &self.config)
            .with_hub(self.hub.clone())
    }

    fn announcements(&self) -> AnnouncementService {
        AnnouncementService::new(self.supabase.clone())
    }

    fn patients(&self) -> PatientService {
        PatientService::with_client(self.supabase.clone())
    }

    async fn publish_announcement(&self, kind: ChangeKind, record: Value) {
        self.hub.publish(ANNOUNCEMENTS_TABLE, kind, record).await;
    }
}

pub fn map_appointment_error(error: AppointmentError) -> AppError {
    match error {
        AppointmentError::SlotFull { .. } => AppError::Conflict(error.to_string()),
        AppointmentError::InvalidTransition { .. }
        | AppointmentError::Blackout(_)
        | AppointmentError::InvalidTimeBucket(_) => AppError::BadRequest(error.to_string()),
        AppointmentError::Validation(msg) => AppError::ValidationError(msg),
        AppointmentError::NotFound => AppError::NotFound(error.to_string()),
        AppointmentError::Persistence(msg) => AppError::Database(msg),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeStreamQuery {
    /// `appointments` (default) or `announcements`.
    pub table: Option<String>,
    /// PostgREST-style equality filter, e.g. `date=eq.2024-06-10`.
    pub filter: Option<String>,
}

impl ChangeStreamQuery {
    fn table(&self) -> Result<&'static str, AppError> {
        match self.table.as_deref().map(str::trim) {
            None | Some("") | Some(APPOINTMENTS_TABLE) => Ok(APPOINTMENTS_TABLE),
            Some(ANNOUNCEMENTS_TABLE) => Ok(ANNOUNCEMENTS_TABLE),
            Some(other) => Err(AppError::BadRequest(format!("Unknown change table '{}'", other))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    pub kind: AnnouncementTemplate,
    pub date: chrono::NaiveDate,
}

// ==============================================================================
// PUBLIC BOOKING HANDLERS
// ==============================================================================

/// Per-bucket capacity for one date, as shown in the booking form.
///
/// Signed-in callers read with their own token so the counts match what booking
/// will check. Anonymous callers need the anon role to have read access to
/// `appointments(date, time, status)`.
#[axum::debug_handler]
pub async fn get_day_slots(
    State(state): State<Arc<AppointmentState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.as_ref().map(|TypedHeader(auth)| auth.token());

    let announcements = state.announcements()
        .list_between(query.date, query.date, token)
        .await
        .map_err(map_appointment_error)?;

    let appointments = state.store(token)
        .list_range(query.date, query.date)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(day_slots(query.date, &appointments, &announcements))))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppointmentState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.as_ref().map(|TypedHeader(auth)| auth.token());

    let announcements = state.announcements()
        .list_between(query.date, query.date, token)
        .await
        .map_err(map_appointment_error)?;

    let reason = is_date_bookable(query.date, &announcements);

    Ok(Json(json!(Availability {
        date: query.date,
        bookable: reason.is_none(),
        reason,
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let role = require_role(&user, &[UserRole::Doctor, UserRole::Patient])?;
    let time = request.validate().map_err(map_appointment_error)?;

    let announcements = state.announcements()
        .list_between(request.date, request.date, Some(token))
        .await
        .map_err(map_appointment_error)?;

    let booking_service = state.booking(token);
    let patient_service = state.patients();

    let patient_id = match (request.patient_id, request.patient) {
        (Some(patient_id), _) => {
            if role == UserRole::Patient {
                let patient = patient_service.get_patient(patient_id, token)
                    .await
                    .map_err(map_patient_error)?;
                if !patient.is_guardian(&user) {
                    return Err(AppError::Forbidden(
                        "Not authorized to book for this patient".to_string(),
                    ));
                }
            }
            patient_id
        }
        (None, Some(mut details)) => {
            // Avoid registering a patient for a booking that cannot happen.
            booking_service.check_slot(request.date, time, &announcements)
                .await
                .map_err(map_appointment_error)?;

            if role == UserRole::Patient {
                details.fill_guardian_from(&user);
            }
            patient_service.create_patient(details, token)
                .await
                .map_err(map_patient_error)?
                .id
        }
        (None, None) => {
            return Err(AppError::ValidationError(
                "Either patient_id or new patient details are required".to_string(),
            ))
        }
    };

    let appointment = booking_service
        .create_appointment(
            NewBooking {
                patient_id,
                date: request.date,
                time,
                purpose: request.purpose,
                doctor_name: request.doctor_name,
            },
            &announcements,
        )
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment request submitted"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let role = require_role(&user, &[UserRole::Doctor, UserRole::Patient])?;

    let appointment = state.store(Some(token))
        .get(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    if role == UserRole::Patient {
        let patient = state.patients()
            .get_patient(appointment.patient_id, token)
            .await
            .map_err(map_patient_error)?;
        if !patient.is_guardian(&user) {
            return Err(AppError::Forbidden("Not authorized to view this appointment".to_string()));
        }
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Doctor])?;

    let appointment = state.booking(auth.token())
        .transition(appointment_id, request.status)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_queue(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    require_role(&user, &[UserRole::Doctor])?;

    let range = QueueRange::parse(query.range.as_deref(), query.date).map_err(map_appointment_error)?;
    let (start, end) = range.bounds(Utc::now().date_naive());

    let appointments = state.store(Some(token))
        .list_range(start, end)
        .await
        .map_err(map_appointment_error)?;
    let announcements = state.announcements()
        .list_between(start, end, Some(token))
        .await
        .map_err(map_appointment_error)?;

    let board = build_queue_board(
        start,
        end,
        &appointments,
        &announcements,
        query.status.unwrap_or_default(),
        query.search.as_deref(),
    );

    Ok(Json(json!(board)))
}

#[axum::debug_handler]
pub async fn get_dashboard_stats(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Doctor])?;

    let appointments = state.store(Some(auth.token()))
        .list_all()
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(dashboard_stats(&appointments))))
}

/// A guardian's children's appointments, upcoming or past.
#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PortalQuery>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    require_role(&user, &[UserRole::Patient])?;

    let phone = user.phone_number();
    let children = state.patients()
        .find_guardian_patients(user.email.as_deref(), phone.as_deref(), token)
        .await
        .map_err(map_patient_error)?;
    let child_ids: Vec<Uuid> = children.iter().map(|child| child.id).collect();

    let appointments = state.store(Some(token))
        .list_for_patients(&child_ids)
        .await
        .map_err(map_appointment_error)?;

    let view = query.view.unwrap_or_default();
    let list = portal_appointments(
        &appointments,
        &child_ids,
        view,
        query.hide_completed,
        Utc::now().date_naive(),
    );

    Ok(Json(json!({
        "view": view,
        "appointments": list,
        "total": list.len()
    })))
}

/// Server-sent events for appointment or announcement changes made through this service.
pub async fn stream_changes(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Query(query): Query<ChangeStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    require_role(&user, &[UserRole::Doctor])?;

    let filter = match query.filter.as_deref() {
        Some(raw) => Some(
            ChangeFilter::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Unsupported filter '{}'", raw)))?,
        ),
        None => None,
    };

    let table = query.table()?;
    let subscription = state.hub.subscribe(table, filter).await;

    let events = stream::unfold(subscription, |mut subscription| async move {
        let change = subscription.next().await?;
        let event = Event::default()
            .event(format!("{:?}", change.kind).to_uppercase())
            .json_data(&change)
            .unwrap_or_else(|e| {
                warn!("Could not encode change event: {}", e);
                Event::default().comment("unencodable change")
            });
        Some((Ok(event), subscription))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

// ==============================================================================
// ANNOUNCEMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_announcements(
    State(state): State<Arc<AppointmentState>>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    let announcements = state.announcements()
        .list(None)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(announcements))
}

#[axum::debug_handler]
pub async fn list_announcements_between(
    State(state): State<Arc<AppointmentState>>,
    Query(query): Query<AnnouncementRangeQuery>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    if query.to < query.from {
        return Err(AppError::ValidationError("'to' must not be before 'from'".to_string()));
    }

    let announcements = state.announcements()
        .list_between(query.from, query.to, None)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(announcements))
}

#[axum::debug_handler]
pub async fn create_announcement(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAnnouncementRequest>,
) -> Result<Json<Announcement>, AppError> {
    require_role(&user, &[UserRole::Doctor])?;

    let announcement = state.announcements()
        .create(request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    state.publish_announcement(ChangeKind::Insert, json!(announcement)).await;
    Ok(Json(announcement))
}

#[axum::debug_handler]
pub async fn update_announcement(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(announcement_id): Path<Uuid>,
    Json(request): Json<UpdateAnnouncementRequest>,
) -> Result<Json<Announcement>, AppError> {
    require_role(&user, &[UserRole::Doctor])?;

    let announcement = state.announcements()
        .update(announcement_id, request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    state.publish_announcement(ChangeKind::Update, json!(announcement)).await;
    Ok(Json(announcement))
}

#[axum::debug_handler]
pub async fn delete_announcement(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(announcement_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[UserRole::Doctor])?;

    state.announcements()
        .delete(announcement_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    state.publish_announcement(ChangeKind::Delete, json!({ "id": announcement_id })).await;
    Ok(Json(json!({
        "success": true,
        "message": "Announcement deleted"
    })))
}

pub async fn get_announcement_template(
    Extension(user): Extension<User>,
    Query(query): Query<TemplateQuery>,
) -> Result<Json<CreateAnnouncementRequest>, AppError> {
    require_role(&user, &[UserRole::Doctor])?;
    Ok(Json(query.kind.draft(query.date)))
}
