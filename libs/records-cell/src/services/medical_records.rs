use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::postgrest::PostgrestClient;

use crate::models::{CreateMedicalRecordRequest, MedicalRecord, RecordsError, RecordsFilter};

pub struct MedicalRecordService {
    client: PostgrestClient,
}

impl MedicalRecordService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: PostgrestClient::new(config),
        }
    }

    pub async fn create_record(
        &self,
        doctor_id: Uuid,
        request: CreateMedicalRecordRequest,
        auth_token: &str,
    ) -> Result<MedicalRecord, RecordsError> {
        debug!("Doctor {} filing medical record for patient {}", doctor_id, request.patient_id);

        let body = json!({
            "patient_id": request.patient_id,
            "doctor_id": doctor_id,
            "title": request.title,
            "details": request.details,
            "record_date": request.record_date.format("%Y-%m-%d").to_string(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                "/rest/v1/medical_records",
                Some(auth_token),
                Some(body),
                Some(headers),
            )
            .await
            .map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(RecordsError::MedicalRecordNotFound)?;
        decode(row)
    }

    pub async fn get_record(
        &self,
        record_id: Uuid,
        auth_token: &str,
    ) -> Result<MedicalRecord, RecordsError> {
        let path = format!("/rest/v1/medical_records?id=eq.{}", record_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(RecordsError::MedicalRecordNotFound)?;
        decode(row)
    }

    pub async fn list_records(
        &self,
        filter: &RecordsFilter,
        auth_token: &str,
    ) -> Result<Vec<MedicalRecord>, RecordsError> {
        let mut query_parts = Vec::new();
        if let Some(patient_id) = filter.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = filter.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        query_parts.push("order=record_date.desc".to_string());

        let path = format!("/rest/v1/medical_records?{}", query_parts.join("&"));
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| RecordsError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(decode).collect()
    }
}

fn decode(row: Value) -> Result<MedicalRecord, RecordsError> {
    serde_json::from_value(row)
        .map_err(|e| RecordsError::DatabaseError(format!("Failed to parse medical record: {}", e)))
}
