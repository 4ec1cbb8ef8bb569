use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::identity::IdentityResolver;
use shared_models::access::{can_access, Action, Resource};
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{DoctorError, DoctorSearchQuery, UpdateDoctorRequest};
use crate::services::DoctorService;

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound(err.to_string()),
            DoctorError::DatabaseError(_) => AppError::Database(err.to_string()),
        }
    }
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = DoctorService::new(&state)
        .search_doctors(query, auth.token())
        .await?;

    Ok(Json(json!({
        "count": doctors.len(),
        "doctors": doctors
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&state)
        .get_doctor(doctor_id, auth.token())
        .await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let identity = IdentityResolver::new(&state)
        .resolve(&user, token)
        .await
        .map_err(|e| AppError::Auth(e.to_string()))?;

    if !can_access(&identity, Action::Modify, &Resource::DoctorProfile { doctor_id }) {
        return Err(AppError::Forbidden(
            "Not authorized to update this doctor profile".to_string(),
        ));
    }

    let doctor = DoctorService::new(&state)
        .update_doctor(doctor_id, request, token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor profile updated"
    })))
}

/// The doctor's patient list: any patient with at least one appointment with
/// them. Visible to that doctor and to admins.
#[axum::debug_handler]
pub async fn doctor_patients(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let identity = IdentityResolver::new(&state)
        .resolve(&user, token)
        .await
        .map_err(|e| AppError::Auth(e.to_string()))?;

    if !identity.is_admin() && identity.doctor_id() != Some(doctor_id) {
        return Err(AppError::Forbidden(
            "Not authorized to view this doctor's patients".to_string(),
        ));
    }

    let patients = DoctorService::new(&state)
        .doctor_patients(doctor_id, token)
        .await?;

    Ok(Json(json!({
        "count": patients.len(),
        "patients": patients
    })))
}
