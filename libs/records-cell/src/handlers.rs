use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::identity::IdentityResolver;
use shared_models::access::{can_access, Action, Resource};
use shared_models::auth::{CallerIdentity, Role, User};
use shared_models::error::AppError;

use crate::models::{
    CreateMedicalRecordRequest, CreatePrescriptionRequest, MedicalRecord, Prescription,
    RecordsError, RecordsFilter, UpdatePrescriptionRequest,
};
use crate::services::{MedicalRecordService, PrescriptionService};

impl From<RecordsError> for AppError {
    fn from(err: RecordsError) -> Self {
        match err {
            RecordsError::PrescriptionNotFound | RecordsError::MedicalRecordNotFound => {
                AppError::NotFound(err.to_string())
            }
            RecordsError::DatabaseError(_) => AppError::Database(err.to_string()),
        }
    }
}

async fn resolve(state: &AppConfig, user: &User, token: &str) -> Result<CallerIdentity, AppError> {
    IdentityResolver::new(state)
        .resolve(user, token)
        .await
        .map_err(|e| AppError::Auth(e.to_string()))
}

/// Pin the list filter to what the caller may see.
fn scope_filter(identity: &CallerIdentity, filter: RecordsFilter) -> Result<RecordsFilter, AppError> {
    match identity.role {
        Role::Admin => Ok(filter),
        Role::Patient => Ok(RecordsFilter {
            patient_id: Some(identity.patient_id().ok_or_else(|| {
                AppError::NotFound("No patient profile linked to this account".to_string())
            })?),
            ..filter
        }),
        Role::Doctor => Ok(RecordsFilter {
            doctor_id: Some(identity.doctor_id().ok_or_else(|| {
                AppError::NotFound("No doctor profile linked to this account".to_string())
            })?),
            ..filter
        }),
    }
}

fn prescription_resource(prescription: &Prescription) -> Resource {
    Resource::Prescription {
        patient_id: prescription.patient_id,
        doctor_id: prescription.doctor_id,
    }
}

fn record_resource(record: &MedicalRecord) -> Resource {
    Resource::MedicalRecord {
        patient_id: record.patient_id,
        doctor_id: record.doctor_id,
    }
}

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_prescription(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();
    let identity = resolve(&state, &user, token).await?;

    // Prescriptions are always issued under the caller's own doctor profile.
    let doctor_id = identity.doctor_id().ok_or_else(|| {
        AppError::Forbidden("Only doctors can issue prescriptions".to_string())
    })?;

    let prescription = PrescriptionService::new(&state)
        .create_prescription(doctor_id, request, token)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "prescription": prescription,
            "message": "Prescription issued"
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(filter): Query<RecordsFilter>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let identity = resolve(&state, &user, token).await?;
    let scoped = scope_filter(&identity, filter)?;

    let prescriptions = PrescriptionService::new(&state)
        .list_prescriptions(&scoped, token)
        .await?;

    Ok(Json(json!({
        "count": prescriptions.len(),
        "prescriptions": prescriptions
    })))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(state): State<Arc<AppConfig>>,
    Path(prescription_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let identity = resolve(&state, &user, token).await?;

    let prescription = PrescriptionService::new(&state)
        .get_prescription(prescription_id, token)
        .await?;

    if !can_access(&identity, Action::Read, &prescription_resource(&prescription)) {
        return Err(AppError::Forbidden(
            "Not authorized to view this prescription".to_string(),
        ));
    }

    Ok(Json(json!(prescription)))
}

#[axum::debug_handler]
pub async fn update_prescription(
    State(state): State<Arc<AppConfig>>,
    Path(prescription_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let identity = resolve(&state, &user, token).await?;
    let service = PrescriptionService::new(&state);

    let prescription = service.get_prescription(prescription_id, token).await?;
    if !can_access(&identity, Action::Modify, &prescription_resource(&prescription)) {
        return Err(AppError::Forbidden(
            "Not authorized to modify this prescription".to_string(),
        ));
    }

    let updated = service
        .update_prescription(prescription_id, request, token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "prescription": updated,
        "message": "Prescription updated"
    })))
}

#[axum::debug_handler]
pub async fn delete_prescription(
    State(state): State<Arc<AppConfig>>,
    Path(prescription_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let identity = resolve(&state, &user, token).await?;
    let service = PrescriptionService::new(&state);

    let prescription = service.get_prescription(prescription_id, token).await?;
    if !can_access(&identity, Action::Modify, &prescription_resource(&prescription)) {
        return Err(AppError::Forbidden(
            "Not authorized to delete this prescription".to_string(),
        ));
    }

    service.delete_prescription(prescription_id, token).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Prescription deleted"
    })))
}

// ==============================================================================
// MEDICAL RECORDS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_medical_record(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateMedicalRecordRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();
    let identity = resolve(&state, &user, token).await?;

    let doctor_id = identity.doctor_id().ok_or_else(|| {
        AppError::Forbidden("Only doctors can file medical records".to_string())
    })?;

    let record = MedicalRecordService::new(&state)
        .create_record(doctor_id, request, token)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "medical_record": record,
            "message": "Medical record filed"
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_medical_records(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(filter): Query<RecordsFilter>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let identity = resolve(&state, &user, token).await?;
    let scoped = scope_filter(&identity, filter)?;

    let records = MedicalRecordService::new(&state)
        .list_records(&scoped, token)
        .await?;

    Ok(Json(json!({
        "count": records.len(),
        "medical_records": records
    })))
}

#[axum::debug_handler]
pub async fn get_medical_record(
    State(state): State<Arc<AppConfig>>,
    Path(record_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let identity = resolve(&state, &user, token).await?;

    let record = MedicalRecordService::new(&state)
        .get_record(record_id, token)
        .await?;

    if !can_access(&identity, Action::Read, &record_resource(&record)) {
        return Err(AppError::Forbidden(
            "Not authorized to view this medical record".to_string(),
        ));
    }

    Ok(Json(json!(record)))
}
