// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::slots::TimeSlot;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_slot: TimeSlot,
    pub status: AppointmentStatus,
    pub duration_minutes: Option<i32>,
    pub appointment_type: Option<AppointmentType>,
    pub method: Option<ConsultationMethod>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub symptoms: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Whether this appointment occupies its slot. Cancelled appointments
    /// never do.
    pub fn occupies_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

/// Fields for an appointment about to be persisted; the store assigns the id
/// and timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_slot: TimeSlot,
    pub status: AppointmentStatus,
    pub duration_minutes: Option<i32>,
    pub appointment_type: Option<AppointmentType>,
    pub method: Option<ConsultationMethod>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = SchedulingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(SchedulingError::InvalidStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    Consultation,
    FollowUp,
    CheckUp,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationMethod {
    InPerson,
    Video,
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Doctor,
    System,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Booking request. The patient is always the caller's own resolved profile,
/// never a client-supplied id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_slot: TimeSlot,
    pub reason: Option<String>,
    pub symptoms: Option<String>,
    pub duration_minutes: Option<i32>,
    pub appointment_type: Option<AppointmentType>,
    pub method: Option<ConsultationMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_date: Option<NaiveDate>,
    pub time_slot: Option<TimeSlot>,
    pub reason: Option<String>,
}

/// The raw status value is kept as a string so membership is validated by the
/// lifecycle manager rather than failing opaquely at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("No patient profile linked to this account")]
    PatientProfileNotFound,

    #[error("No doctor profile linked to this account")]
    DoctorProfileNotFound,

    #[error("Slot {slot} on {date} is already booked for this doctor")]
    SlotTaken { date: NaiveDate, slot: TimeSlot },

    #[error("'{0}' is not a valid appointment status")]
    InvalidStatus(String),

    #[error("Time slot '{0}' is not on the booking grid")]
    InvalidSlot(String),

    #[error("Invalid caller identity: {0}")]
    Identity(String),

    #[error("Store error: {0}")]
    Store(String),
}
