use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub medication: String,
    pub dosage: String,
    pub instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub medication: String,
    pub dosage: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePrescriptionRequest {
    pub medication: Option<String>,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub title: String,
    pub details: Option<String>,
    pub record_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMedicalRecordRequest {
    pub patient_id: Uuid,
    pub title: String,
    pub details: Option<String>,
    pub record_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordsFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RecordsError {
    #[error("Prescription not found")]
    PrescriptionNotFound,

    #[error("Medical record not found")]
    MedicalRecordNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
