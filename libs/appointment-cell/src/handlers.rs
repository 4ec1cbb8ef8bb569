// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::access::{can_access, Action, Resource};
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentFilter, BookAppointmentRequest, CancelAppointmentRequest,
    RescheduleAppointmentRequest, SchedulingError, UpdateStatusRequest,
};
use crate::state::SchedulingState;

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::AppointmentNotFound
            | SchedulingError::DoctorNotFound
            | SchedulingError::PatientProfileNotFound
            | SchedulingError::DoctorProfileNotFound => AppError::NotFound(err.to_string()),
            SchedulingError::SlotTaken { .. }
            | SchedulingError::InvalidStatus(_)
            | SchedulingError::InvalidSlot(_) => AppError::BadRequest(err.to_string()),
            SchedulingError::Identity(_) => AppError::Auth(err.to_string()),
            SchedulingError::Store(_) => AppError::Database(err.to_string()),
        }
    }
}

fn appointment_resource(appointment: &Appointment) -> Resource {
    Resource::Appointment {
        patient_id: appointment.patient_id,
        doctor_id: appointment.doctor_id,
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

// ==============================================================================
// HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn available_slots(
    State(state): State<Arc<SchedulingState>>,
    Extension(_user): Extension<User>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .availability
        .available_slots(query.doctor_id, query.date)
        .await?;

    Ok(Json(json!({
        "doctor_id": query.doctor_id,
        "date": query.date,
        "available_slots": slots
    })))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let identity = state.booking.resolve_identity(&user).await?;
    let appointment = state.booking.book_appointment(&identity, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<Value>, AppError> {
    let identity = state.booking.resolve_identity(&user).await?;
    let appointments = state.booking.list_for_caller(&identity, filter).await?;

    Ok(Json(json!({
        "count": appointments.len(),
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<SchedulingState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let identity = state.booking.resolve_identity(&user).await?;
    let appointment = state.booking.get_appointment(appointment_id).await?;

    if !can_access(&identity, Action::Read, &appointment_resource(&appointment)) {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<SchedulingState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let identity = state.booking.resolve_identity(&user).await?;
    let appointment = state.booking.get_appointment(appointment_id).await?;

    if !can_access(&identity, Action::Modify, &appointment_resource(&appointment)) {
        return Err(AppError::Forbidden(
            "Not authorized to reschedule this appointment".to_string(),
        ));
    }

    let rescheduled = state
        .booking
        .reschedule_appointment(appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": rescheduled,
        "message": "Appointment rescheduled successfully"
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<SchedulingState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let identity = state.booking.resolve_identity(&user).await?;
    let appointment = state.booking.get_appointment(appointment_id).await?;

    if !can_access(&identity, Action::Modify, &appointment_resource(&appointment)) {
        return Err(AppError::Forbidden(
            "Not authorized to update this appointment".to_string(),
        ));
    }

    let updated = state
        .booking
        .set_status(appointment_id, &request.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": "Appointment status updated"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<SchedulingState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let identity = state.booking.resolve_identity(&user).await?;
    let appointment = state.booking.get_appointment(appointment_id).await?;

    if !can_access(&identity, Action::Modify, &appointment_resource(&appointment)) {
        return Err(AppError::Forbidden(
            "Not authorized to cancel this appointment".to_string(),
        ));
    }

    let cancelled = state
        .booking
        .cancel_appointment(appointment_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": cancelled,
        "message": "Appointment cancelled"
    })))
}
