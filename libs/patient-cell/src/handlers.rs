use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
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

use crate::models::{PatientError, UpdatePatientRequest};
use crate::services::PatientService;

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::DatabaseError(_) => AppError::Database(err.to_string()),
        }
    }
}

async fn resolve(state: &AppConfig, user: &User, token: &str) -> Result<CallerIdentity, AppError> {
    IdentityResolver::new(state)
        .resolve(user, token)
        .await
        .map_err(|e| AppError::Auth(e.to_string()))
}

/// The caller's own patient profile.
#[axum::debug_handler]
pub async fn my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let identity = resolve(&state, &user, token).await?;

    let patient = PatientService::new(&state)
        .get_patient_by_user(identity.user_id, token)
        .await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let identity = resolve(&state, &user, token).await?;
    let service = PatientService::new(&state);

    // A doctor's visibility hinges on the appointment relationship, which is
    // looked up here and fed to the predicate as a fact.
    let treated_by_caller = match (identity.role, identity.doctor_id()) {
        (Role::Doctor, Some(doctor_id)) => service.treated_by(patient_id, doctor_id, token).await?,
        _ => false,
    };

    let resource = Resource::PatientProfile { patient_id, treated_by_caller };
    if !can_access(&identity, Action::Read, &resource) {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient profile".to_string(),
        ));
    }

    let patient = service.get_patient(patient_id, token).await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let identity = resolve(&state, &user, token).await?;

    let resource = Resource::PatientProfile { patient_id, treated_by_caller: false };
    if !can_access(&identity, Action::Modify, &resource) {
        return Err(AppError::Forbidden(
            "Not authorized to update this patient profile".to_string(),
        ));
    }

    let patient = PatientService::new(&state)
        .update_patient(patient_id, request, token)
        .await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient,
        "message": "Patient profile updated"
    })))
}
